//! The canonical result row.
//!
//! Backends convert their native row types into [`Row`] and then call
//! [`Row::canonicalize`], which irons out the differences the two
//! engines expose on the result path: numeric strings become numbers,
//! NULL aggregates over empty ranges become `0`, and `activo`-style
//! flag columns become real booleans. Route code and reports can then
//! do arithmetic on any amount column without null checks.

use crate::value::Value;

/// Column names (or suffixes) that are numeric amounts by convention.
/// A NULL in one of these is an empty aggregate and is coerced to 0.
const AMOUNT_MARKERS: &[&str] = &["total", "promedio", "precio", "valor", "kilos", "pesos"];

/// Columns holding a boolean flag, stored as 0/1 by SQLite.
const FLAG_COLUMNS: &[&str] = &["activo"];

/// A single result row: parallel column-name and value vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

fn is_amount_column(name: &str) -> bool {
    AMOUNT_MARKERS.iter().any(|m| name.contains(m))
}

impl Row {
    /// Creates a row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the vectors disagree in length; backends construct
    /// both from the same driver row, so a mismatch is a bug.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(columns.len(), values.len(), "column/value length mismatch");
        Self { columns, values }
    }

    /// The column names, in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Looks up a cell by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| &self.values[i])
    }

    /// Integer cell, lenient about string-typed aggregates.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// Float cell, lenient about integer and string cells.
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    /// Float cell with the zero-default the report layer relies on.
    pub fn get_float_or_zero(&self, name: &str) -> f64 {
        self.get_float(name).unwrap_or(0.0)
    }

    /// Integer cell with zero default.
    pub fn get_int_or_zero(&self, name: &str) -> i64 {
        self.get_int(name).unwrap_or(0)
    }

    /// String cell.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Boolean cell (accepts 0/1 integers).
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Rewrites cells into canonical shape.
    ///
    /// - numeric-looking strings become `Int`/`Float`,
    /// - NULL in an amount-named column becomes `Float(0.0)`,
    /// - integer 0/1 in a flag column becomes `Bool`.
    #[must_use]
    pub fn canonicalize(mut self) -> Self {
        for (name, value) in self.columns.iter().zip(self.values.iter_mut()) {
            match value {
                Value::String(s) if is_amount_column(name) => {
                    let trimmed = s.trim();
                    if let Ok(i) = trimmed.parse::<i64>() {
                        *value = Value::Int(i);
                    } else if let Ok(f) = trimmed.parse::<f64>() {
                        *value = Value::Float(f);
                    }
                }
                Value::Null if is_amount_column(name) => {
                    *value = Value::Float(0.0);
                }
                Value::Int(i) if FLAG_COLUMNS.contains(&name.as_str()) => {
                    *value = Value::Bool(*i != 0);
                }
                _ => {}
            }
        }
        self
    }

    /// Serializes the row as a JSON object for API payloads.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cols: &[&str], vals: Vec<Value>) -> Row {
        Row::new(cols.iter().map(ToString::to_string).collect(), vals)
    }

    #[test]
    fn test_get_by_name() {
        let r = row(&["id", "nombre"], vec![Value::Int(1), Value::from("PET")]);
        assert_eq!(r.get_int("id"), Some(1));
        assert_eq!(r.get_str("nombre"), Some("PET"));
        assert!(r.get("ausente").is_none());
    }

    #[test]
    fn test_canonicalize_numeric_string() {
        let r = row(&["total_pesos"], vec![Value::String("21000.5".into())]).canonicalize();
        assert_eq!(r.get("total_pesos"), Some(&Value::Float(21000.5)));
    }

    #[test]
    fn test_canonicalize_integral_string() {
        let r = row(&["total_kilos"], vec![Value::String("40".into())]).canonicalize();
        assert_eq!(r.get("total_kilos"), Some(&Value::Int(40)));
    }

    #[test]
    fn test_canonicalize_null_aggregate_to_zero() {
        let r = row(
            &["total_pesos", "promedio_venta", "observaciones"],
            vec![Value::Null, Value::Null, Value::Null],
        )
        .canonicalize();
        assert_eq!(r.get("total_pesos"), Some(&Value::Float(0.0)));
        assert_eq!(r.get("promedio_venta"), Some(&Value::Float(0.0)));
        // Non-amount columns keep their NULL.
        assert_eq!(r.get("observaciones"), Some(&Value::Null));
    }

    #[test]
    fn test_canonicalize_flag_column() {
        let r = row(&["activo"], vec![Value::Int(1)]).canonicalize();
        assert_eq!(r.get("activo"), Some(&Value::Bool(true)));
        let r = row(&["activo"], vec![Value::Int(0)]).canonicalize();
        assert_eq!(r.get("activo"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_non_amount_string_untouched() {
        let r = row(&["nombre"], vec![Value::String("42".into())]).canonicalize();
        assert_eq!(r.get_str("nombre"), Some("42"));
    }

    #[test]
    fn test_to_json() {
        let r = row(
            &["id", "nombre", "activo"],
            vec![Value::Int(3), Value::from("Cobre #1"), Value::Bool(true)],
        );
        assert_eq!(
            r.to_json(),
            serde_json::json!({"id": 3, "nombre": "Cobre #1", "activo": true})
        );
    }

    #[test]
    fn test_zero_defaults() {
        let r = row(&["x"], vec![Value::Null]);
        assert_eq!(r.get_float_or_zero("x"), 0.0);
        assert_eq!(r.get_int_or_zero("missing"), 0);
    }
}
