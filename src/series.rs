use std::collections::BTreeMap;
use std::fmt;

use fxhash::FxHashMap;
use ndarray::Array2;

use super::error::SeriesError;

/// Instrument lineage of a measurement series.
///
/// Families differ only in a couple of merge rules (notably the OPC top-edge
/// trim); everything else is data-driven through the fields mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentFamily {
    Smps,
    Opc,
    Aps,
    Cpc,
    Other(String),
}

impl InstrumentFamily {
    fn from_token(token: &str) -> Self {
        match token {
            "SMPS" => Self::Smps,
            "OPC" => Self::Opc,
            "APS" => Self::Aps,
            "CPC" => Self::Cpc,
            _ => Self::Other(token.to_string()),
        }
    }
}

impl fmt::Display for InstrumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smps => write!(f, "SMPS"),
            Self::Opc => write!(f, "OPC"),
            Self::Aps => write!(f, "APS"),
            Self::Cpc => write!(f, "CPC"),
            Self::Other(token) => write!(f, "{token}"),
        }
    }
}

/// Instrument kind tag. A merged series carries its earlier parent's family
/// with the concatenated marker set, so later merges still apply the right
/// family rules (e.g. the OPC bin-edge trim).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentKind {
    pub family: InstrumentFamily,
    pub concatenated: bool,
}

impl InstrumentKind {
    pub fn new(family: InstrumentFamily) -> Self {
        Self {
            family,
            concatenated: false,
        }
    }

    /// The kind a merge result is stamped with: same family, concatenated set.
    pub fn as_concatenated(&self) -> Self {
        Self {
            family: self.family.clone(),
            concatenated: true,
        }
    }
}

impl From<&str> for InstrumentKind {
    /// Parse tags of the form "SMPS" or "OPC_concatenated". Unknown family
    /// tokens are preserved verbatim.
    fn from(tag: &str) -> Self {
        let mut parts = tag.splitn(2, '_');
        let family = InstrumentFamily::from_token(parts.next().unwrap_or(""));
        let concatenated = parts.next() == Some("concatenated");
        Self {
            family,
            concatenated,
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.concatenated {
            write!(f, "{}_concatenated", self.family)
        } else {
            write!(f, "{}", self.family)
        }
    }
}

/// A sample value which may be numeric or textual depending on the source
/// (ids, comments, status flags). The tag is explicit; there is no silent
/// parse-and-fall-back.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericOrText {
    Numeric(f64),
    Text(String),
    Missing,
}

/// Payload of a field. Scalar channels carry one value per sample; matrix
/// channels are diameter-resolved with shape `[bin_count, sample_count]`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    Scalar(Vec<f64>),
    Matrix(Array2<f64>),
    Tagged(Vec<NumericOrText>),
}

impl FieldData {
    /// Number of samples covered by this payload.
    pub fn sample_len(&self) -> usize {
        match self {
            Self::Scalar(data) => data.len(),
            Self::Matrix(data) => data.ncols(),
            Self::Tagged(data) => data.len(),
        }
    }
}

/// One named measurement channel with its display metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub data: FieldData,
    pub units: String,
    pub axis_label: String,
    pub valid_min: Option<f64>,
    pub valid_max: Option<f64>,
}

impl Field {
    pub fn scalar(data: Vec<f64>, units: &str) -> Self {
        Self {
            data: FieldData::Scalar(data),
            units: units.to_string(),
            axis_label: String::new(),
            valid_min: None,
            valid_max: None,
        }
    }

    pub fn matrix(data: Array2<f64>, units: &str) -> Self {
        Self {
            data: FieldData::Matrix(data),
            units: units.to_string(),
            axis_label: String::new(),
            valid_min: None,
            valid_max: None,
        }
    }

    pub fn tagged(data: Vec<NumericOrText>, units: &str) -> Self {
        Self {
            data: FieldData::Tagged(data),
            units: units.to_string(),
            axis_label: String::new(),
            valid_min: None,
            valid_max: None,
        }
    }
}

/// A time axis field: one timestamp string per sample, plus the time format
/// description (in `time` crate syntax) those strings are written in.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeField {
    pub data: Vec<String>,
    pub units: String,
}

impl TimeField {
    pub fn new(data: Vec<String>, units: &str) -> Self {
        Self {
            data,
            units: units.to_string(),
        }
    }
}

/// Ordered diameter bin midpoints shared by all matrix fields of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct DiameterField {
    pub data: Vec<f64>,
    pub units: String,
    pub valid_min: f64,
    pub valid_max: f64,
}

/// One instrument run: a time-indexed set of scalar and diameter-resolved
/// measurement channels.
///
/// Invariants:
/// - every scalar/tagged field holds `sample_count` samples,
/// - every matrix field has `diameter.data.len()` rows and `sample_count`
///   columns; the OPC family stores bin edges, so its matrices may carry one
///   fewer row than grid entries,
/// - `variables` names exactly the matrix fields,
/// - at least one of `datetime` or the `date`/`time` pair is populated.
///
/// A merge never mutates its inputs; it works on clones.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSeries {
    pub sample_count: usize,
    pub instrument_kind: InstrumentKind,
    /// 1-based sample number channel.
    pub sample: Field,
    /// Combined date-time axis. Derivable from `date` + `time`; see
    /// [`MeasurementSeries::ensure_datetime`].
    pub datetime: Option<TimeField>,
    pub date: TimeField,
    pub time: TimeField,
    pub diameter: Option<DiameterField>,
    /// Auxiliary and primary channels by name.
    pub fields: BTreeMap<String, Field>,
    /// Ordered names of the diameter-resolved primary channels.
    pub variables: Vec<String>,
    /// Instrument/session attributes; not sample-indexed.
    pub metadata: FxHashMap<String, String>,
}

impl MeasurementSeries {
    /// Create a series from its time axes. The sample number channel is
    /// generated as a fresh 1-based sequence.
    pub fn new(instrument_kind: InstrumentKind, date: TimeField, time: TimeField) -> Self {
        let sample_count = date.data.len();
        Self {
            sample_count,
            instrument_kind,
            sample: Field::scalar((1..=sample_count).map(|i| i as f64).collect(), "#"),
            datetime: None,
            date,
            time,
            diameter: None,
            fields: BTreeMap::new(),
            variables: Vec::new(),
            metadata: FxHashMap::default(),
        }
    }

    pub fn set_diameter(&mut self, diameter: DiameterField) {
        self.diameter = Some(diameter);
    }

    /// OPC grids hold bin edges, one more edge than matrix row; every other
    /// family pairs each grid entry with a row.
    fn matrix_rows_valid(&self, bins: usize, rows: usize) -> bool {
        rows == bins || (self.instrument_kind.family == InstrumentFamily::Opc && rows + 1 == bins)
    }

    /// Add a scalar or tagged channel, enforcing the sample-count invariant.
    pub fn add_field(&mut self, name: &str, field: Field) -> Result<(), SeriesError> {
        if matches!(field.data, FieldData::Matrix(_)) {
            return Err(SeriesError::UnlistedMatrix(name.to_string()));
        }
        let found = field.data.sample_len();
        if found != self.sample_count {
            return Err(SeriesError::LengthMismatch {
                name: name.to_string(),
                expected: self.sample_count,
                found,
            });
        }
        self.fields.insert(name.to_string(), field);
        Ok(())
    }

    /// Add a diameter-resolved primary channel, enforcing the shape invariant
    /// against the diameter grid and the sample count.
    pub fn add_variable(&mut self, name: &str, field: Field) -> Result<(), SeriesError> {
        let matrix = match &field.data {
            FieldData::Matrix(matrix) => matrix,
            _ => return Err(SeriesError::MissingVariable(name.to_string())),
        };
        let bins = match &self.diameter {
            Some(diameter) => diameter.data.len(),
            None => return Err(SeriesError::MissingDiameter(name.to_string())),
        };
        let expected = (bins, self.sample_count);
        if matrix.ncols() != self.sample_count || !self.matrix_rows_valid(bins, matrix.nrows()) {
            return Err(SeriesError::ShapeMismatch {
                name: name.to_string(),
                expected,
                found: matrix.dim(),
            });
        }
        self.fields.insert(name.to_string(), field);
        if !self.variables.iter().any(|v| v == name) {
            self.variables.push(name.to_string());
        }
        Ok(())
    }

    /// Derive the combined `datetime` axis from `date` + `time` if it is not
    /// already present. Format strings are joined with a space, as are the
    /// per-sample strings.
    pub fn ensure_datetime(&mut self) {
        if self.datetime.is_some() {
            return;
        }
        let units = format!("{} {}", self.date.units, self.time.units);
        let data = self
            .date
            .data
            .iter()
            .zip(self.time.data.iter())
            .map(|(date, time)| format!("{date} {time}"))
            .collect();
        self.datetime = Some(TimeField { data, units });
    }

    /// Check the structural invariants of the series.
    pub fn validate(&self) -> Result<(), SeriesError> {
        let check_len = |name: &str, found: usize| -> Result<(), SeriesError> {
            if found != self.sample_count {
                Err(SeriesError::LengthMismatch {
                    name: name.to_string(),
                    expected: self.sample_count,
                    found,
                })
            } else {
                Ok(())
            }
        };
        check_len("sample", self.sample.data.sample_len())?;
        check_len("date", self.date.data.len())?;
        check_len("time", self.time.data.len())?;
        if let Some(datetime) = &self.datetime {
            check_len("datetime", datetime.data.len())?;
        }
        for (name, field) in &self.fields {
            match &field.data {
                FieldData::Matrix(matrix) => {
                    if !self.variables.iter().any(|v| v == name) {
                        return Err(SeriesError::UnlistedMatrix(name.clone()));
                    }
                    let bins = match &self.diameter {
                        Some(diameter) => diameter.data.len(),
                        None => return Err(SeriesError::MissingDiameter(name.clone())),
                    };
                    let expected = (bins, self.sample_count);
                    if matrix.ncols() != self.sample_count
                        || !self.matrix_rows_valid(bins, matrix.nrows())
                    {
                        return Err(SeriesError::ShapeMismatch {
                            name: name.clone(),
                            expected,
                            found: matrix.dim(),
                        });
                    }
                }
                _ => check_len(name, field.data.sample_len())?,
            }
        }
        for name in &self.variables {
            match self.fields.get(name) {
                Some(field) if matches!(field.data, FieldData::Matrix(_)) => {}
                _ => return Err(SeriesError::MissingVariable(name.clone())),
            }
        }
        Ok(())
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_kind_round_trip() {
        let kind = InstrumentKind::from("OPC_concatenated");
        assert_eq!(kind.family, InstrumentFamily::Opc);
        assert!(kind.concatenated);
        assert_eq!(kind.to_string(), "OPC_concatenated");

        let kind = InstrumentKind::from("SMPS");
        assert!(!kind.concatenated);
        assert_eq!(kind.as_concatenated().to_string(), "SMPS_concatenated");
    }

    #[test]
    fn test_datetime_derivation() {
        let mut series = MeasurementSeries::new(
            InstrumentKind::from("SMPS"),
            TimeField::new(
                vec!["2020-01-01".to_string(), "2020-01-01".to_string()],
                "[year]-[month]-[day]",
            ),
            TimeField::new(
                vec!["00:00:00".to_string(), "00:05:00".to_string()],
                "[hour]:[minute]:[second]",
            ),
        );
        series.ensure_datetime();
        let datetime = series.datetime.as_ref().unwrap();
        assert_eq!(datetime.units, "[year]-[month]-[day] [hour]:[minute]:[second]");
        assert_eq!(datetime.data[1], "2020-01-01 00:05:00");
    }

    #[test]
    fn test_opc_edge_grid_allows_one_fewer_row() {
        let date = TimeField::new(vec!["2020-01-01".to_string()], "[year]-[month]-[day]");
        let time = TimeField::new(vec!["00:00:00".to_string()], "[hour]:[minute]:[second]");
        let edges = DiameterField {
            data: vec![1.0, 2.0, 3.0, 4.0],
            units: "um".to_string(),
            valid_min: 1.0,
            valid_max: 4.0,
        };

        let mut opc =
            MeasurementSeries::new(InstrumentKind::from("OPC"), date.clone(), time.clone());
        opc.set_diameter(edges.clone());
        opc.add_variable("concentration", Field::matrix(Array2::zeros((3, 1)), "#/cm3"))
            .unwrap();
        opc.validate().unwrap();

        // other families keep the strict one-row-per-entry pairing
        let mut smps = MeasurementSeries::new(InstrumentKind::from("SMPS"), date, time);
        smps.set_diameter(edges);
        assert!(smps
            .add_variable("concentration", Field::matrix(Array2::zeros((3, 1)), "#/cm3"))
            .is_err());
    }

    #[test]
    fn test_invariants_enforced_on_add() {
        let mut series = MeasurementSeries::new(
            InstrumentKind::from("SMPS"),
            TimeField::new(vec!["2020-01-01".to_string()], "[year]-[month]-[day]"),
            TimeField::new(vec!["00:00:00".to_string()], "[hour]:[minute]:[second]"),
        );
        assert!(series
            .add_field("temperature", Field::scalar(vec![20.0, 21.0], "C"))
            .is_err());
        assert!(series
            .add_variable(
                "concentration",
                Field::matrix(Array2::zeros((3, 1)), "#/cm3")
            )
            .is_err());
        series.set_diameter(DiameterField {
            data: vec![10.0, 20.0, 30.0],
            units: "nm".to_string(),
            valid_min: 10.0,
            valid_max: 30.0,
        });
        series
            .add_variable(
                "concentration",
                Field::matrix(Array2::zeros((3, 1)), "#/cm3"),
            )
            .unwrap();
        series
            .add_field("temperature", Field::scalar(vec![20.0], "C"))
            .unwrap();
        series.validate().unwrap();
    }
}
