//! SQL fragment builder.
//!
//! Composes [`Statement`]s from a [`TableSpec`] and a [`ListFilter`].
//! Identifiers come only from the spec; every user value is a bound
//! parameter. List queries carry a deterministic ordering (business
//! date, creation timestamp, id, all descending) so pagination is
//! stable even when many rows share a date.

use crate::filter::ListFilter;
use crate::storage::Statement;
use crate::table::TableSpec;
use crate::value::Value;

fn conditions(spec: &TableSpec, filter: &ListFilter) -> (Vec<String>, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(col) = spec.date_column {
        if let Some(inicio) = filter.fecha_inicio {
            clauses.push(format!("{col} >= ?"));
            params.push(Value::Date(inicio));
        }
        if let Some(fin) = filter.fecha_fin {
            clauses.push(format!("{col} <= ?"));
            params.push(Value::Date(fin));
        }
    }
    if let (Some(col), Some(tipo)) = (spec.tipo_precio_column, filter.tipo_precio) {
        clauses.push(format!("{col} = ?"));
        params.push(Value::from(tipo.as_str()));
    }
    if let (Some(col), Some(id)) = (spec.material_id_column, filter.material_id) {
        clauses.push(format!("{col} = ?"));
        params.push(Value::Int(id));
    }
    if let (Some(col), Some(id)) = (spec.categoria_id_column, filter.categoria_id) {
        clauses.push(format!("{col} = ?"));
        params.push(Value::Int(id));
    }
    if let (Some(col), Some(cliente)) = (spec.cliente_column, filter.cliente.as_deref()) {
        clauses.push(format!("{col} LIKE ?"));
        params.push(Value::String(format!("%{cliente}%")));
    }
    if let (Some(col), Some(categoria)) = (spec.categoria_column, filter.categoria.as_deref()) {
        clauses.push(format!("{col} = ?"));
        params.push(Value::from(categoria));
    }
    if let (Some(col), Some(activo)) = (spec.activo_column, filter.activo) {
        clauses.push(format!("{col} = ?"));
        params.push(Value::Bool(activo));
    }

    (clauses, params)
}

fn where_sql(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn default_order(spec: &TableSpec) -> String {
    let mut keys = Vec::new();
    if let Some(col) = spec.date_column {
        keys.push(format!("{col} DESC"));
    }
    if let Some(col) = spec.created_column {
        keys.push(format!("{col} DESC"));
    }
    keys.push(format!("{} DESC", spec.id_column));
    keys.join(", ")
}

/// Builds the paginated list query. `order_by` overrides the default
/// date/created/id descending tiebreak (it must be a fixed string, not
/// user input).
pub fn build_list(spec: &TableSpec, filter: &ListFilter, order_by: Option<&str>) -> Statement {
    let (clauses, mut params) = conditions(spec, filter);
    let order = order_by.map_or_else(|| default_order(spec), ToString::to_string);
    let sql = format!(
        "{}{} ORDER BY {order} LIMIT ? OFFSET ?",
        spec.select_sql,
        where_sql(&clauses),
    );
    params.push(Value::from(filter.limite));
    params.push(Value::from(filter.offset()));
    Statement::new(sql, params)
}

/// Builds the full (un-paginated) list query for catalog endpoints
/// that return every matching row.
pub fn build_list_all(spec: &TableSpec, filter: &ListFilter, order_by: Option<&str>) -> Statement {
    let (clauses, params) = conditions(spec, filter);
    let order = order_by.map_or_else(|| default_order(spec), ToString::to_string);
    let sql = format!(
        "{}{} ORDER BY {order}",
        spec.select_sql,
        where_sql(&clauses),
    );
    Statement::new(sql, params)
}

/// Builds the companion count query: same conditions, no ordering or
/// pagination.
pub fn build_count(spec: &TableSpec, filter: &ListFilter) -> Statement {
    let (clauses, params) = conditions(spec, filter);
    let sql = format!(
        "SELECT COUNT(*) AS total {}{}",
        spec.from_sql,
        where_sql(&clauses),
    );
    Statement::new(sql, params)
}

/// Builds the single-row fetch by id.
pub fn build_get(spec: &TableSpec, id: i64) -> Statement {
    let sql = format!("{} WHERE {} = ?", spec.select_sql, spec.id_column);
    Statement::new(sql, vec![Value::Int(id)])
}

/// Builds an INSERT from (column, value) pairs.
pub fn build_insert(table: &str, columns: Vec<(&str, Value)>) -> Statement {
    let names: Vec<&str> = columns.iter().map(|(c, _)| *c).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        names.join(", "),
    );
    let params = columns.into_iter().map(|(_, v)| v).collect();
    Statement::new(sql, params)
}

/// Builds an UPDATE of the given columns on the row with this id.
pub fn build_update(table: &str, sets: Vec<(&str, Value)>, id: i64) -> Statement {
    let assignments: Vec<String> = sets.iter().map(|(c, _)| format!("{c} = ?")).collect();
    let sql = format!(
        "UPDATE {table} SET {} WHERE id = ?",
        assignments.join(", "),
    );
    let mut params: Vec<Value> = sets.into_iter().map(|(_, v)| v).collect();
    params.push(Value::Int(id));
    Statement::new(sql, params)
}

/// Builds a DELETE by id.
pub fn build_delete(table: &str, id: i64) -> Statement {
    Statement::new(format!("DELETE FROM {table} WHERE id = ?"), vec![Value::Int(id)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ListFilter, RawListParams, TipoPrecio};
    use crate::table::TableSpec;
    use chrono::NaiveDate;

    fn filter() -> ListFilter {
        ListFilter::from_raw(&RawListParams::default()).unwrap()
    }

    #[test]
    fn test_list_default_ordering_and_pagination() {
        let stmt = build_list(&TableSpec::compras_generales(), &filter(), None);
        assert!(stmt
            .sql
            .ends_with("ORDER BY fecha DESC, fecha_creacion DESC, id DESC LIMIT ? OFFSET ?"));
        assert_eq!(
            stmt.params,
            vec![Value::Int(100), Value::Int(0)]
        );
    }

    #[test]
    fn test_list_binds_filters_in_order() {
        let mut f = filter();
        f.fecha_inicio = NaiveDate::from_ymd_opt(2024, 1, 1);
        f.fecha_fin = NaiveDate::from_ymd_opt(2024, 1, 31);
        f.tipo_precio = Some(TipoPrecio::Camion);
        f.cliente = Some("Pérez".to_string());
        let stmt = build_list(&TableSpec::compras_generales(), &f, None);
        assert!(stmt.sql.contains("WHERE fecha >= ? AND fecha <= ?"));
        assert!(stmt.sql.contains("tipo_precio = ?"));
        assert!(stmt.sql.contains("cliente LIKE ?"));
        assert_eq!(stmt.params[2], Value::from("camion"));
        assert_eq!(stmt.params[3], Value::from("%Pérez%"));
        // limit/offset ride at the end
        assert_eq!(stmt.params.len(), 6);
    }

    #[test]
    fn test_filter_fields_without_column_are_ignored() {
        let mut f = filter();
        f.tipo_precio = Some(TipoPrecio::Noche);
        let stmt = build_list(&TableSpec::ventas(), &f, None);
        assert!(!stmt.sql.contains("tipo_precio"));
    }

    #[test]
    fn test_list_all_has_no_pagination() {
        let mut f = filter();
        f.activo = Some(true);
        let stmt = build_list_all(&TableSpec::materiales(), &f, Some("categoria, nombre"));
        assert!(stmt.sql.ends_with("ORDER BY categoria, nombre"));
        assert!(!stmt.sql.contains("LIMIT"));
        assert_eq!(stmt.sql.matches('?').count(), stmt.params.len());
        assert_eq!(stmt.params, vec![Value::Bool(true)]);
    }

    #[test]
    fn test_count_matches_list_conditions_without_pagination() {
        let mut f = filter();
        f.material_id = Some(7);
        let list = build_list(&TableSpec::compras_materiales(), &f, None);
        let count = build_count(&TableSpec::compras_materiales(), &f);
        assert!(count.sql.starts_with("SELECT COUNT(*) AS total FROM"));
        assert!(count.sql.contains("cm.material_id = ?"));
        assert!(!count.sql.contains("ORDER BY"));
        assert!(!count.sql.contains("LIMIT"));
        // count params are the list params minus limit/offset
        assert_eq!(count.params, list.params[..list.params.len() - 2].to_vec());
    }

    #[test]
    fn test_order_override() {
        let stmt = build_list(&TableSpec::materiales(), &filter(), Some("categoria, nombre"));
        assert!(stmt.sql.contains("ORDER BY categoria, nombre LIMIT"));
    }

    #[test]
    fn test_get_uses_qualified_id() {
        let stmt = build_get(&TableSpec::ventas(), 12);
        assert!(stmt.sql.ends_with("WHERE v.id = ?"));
        assert_eq!(stmt.params, vec![Value::Int(12)]);
    }

    #[test]
    fn test_insert_shape() {
        let stmt = build_insert(
            "ventas",
            vec![
                ("material_id", Value::Int(3)),
                ("kilos", Value::Float(40.0)),
                ("precio_kilo", Value::Float(525.0)),
                ("total_pesos", Value::Float(21000.0)),
            ],
        );
        assert_eq!(
            stmt.sql,
            "INSERT INTO ventas (material_id, kilos, precio_kilo, total_pesos) VALUES (?, ?, ?, ?)"
        );
        assert_eq!(stmt.params.len(), 4);
    }

    #[test]
    fn test_update_appends_id_param() {
        let stmt = build_update(
            "materiales",
            vec![("activo", Value::Bool(false))],
            5,
        );
        assert_eq!(stmt.sql, "UPDATE materiales SET activo = ? WHERE id = ?");
        assert_eq!(stmt.params, vec![Value::Bool(false), Value::Int(5)]);
    }

    #[test]
    fn test_delete() {
        let stmt = build_delete("gastos", 9);
        assert_eq!(stmt.sql, "DELETE FROM gastos WHERE id = ?");
        assert_eq!(stmt.params, vec![Value::Int(9)]);
    }

    #[test]
    fn test_placeholder_count_matches_params() {
        let mut f = filter();
        f.fecha_inicio = NaiveDate::from_ymd_opt(2024, 3, 1);
        f.cliente = Some("x".to_string());
        for spec in [
            TableSpec::compras_generales(),
            TableSpec::compras_materiales(),
            TableSpec::ventas(),
            TableSpec::gastos(),
        ] {
            let stmt = build_list(&spec, &f, None);
            let holes = stmt.sql.matches('?').count();
            assert_eq!(holes, stmt.params.len(), "{}", spec.name);
        }
    }
}
