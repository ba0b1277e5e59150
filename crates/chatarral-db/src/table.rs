//! The table catalog.
//!
//! Every identifier that ever reaches SQL text comes from one of the
//! [`TableSpec`] constants below. Route code picks a spec and a
//! [`ListFilter`](crate::filter::ListFilter); the builder combines the
//! two. User input never contributes an identifier, only bound values.

/// Static description of a listable table: its select/from clauses and
/// the qualified columns the generic filters can bind against. A
/// filter field whose column is `None` here simply does not apply to
/// this table.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Base table name, for inserts/updates/deletes.
    pub name: &'static str,
    /// Projection used by list and get queries.
    pub select_sql: &'static str,
    /// FROM clause (including joins), shared by list and count.
    pub from_sql: &'static str,
    /// Qualified primary-key column.
    pub id_column: &'static str,
    /// Qualified business-date column, if the table has one.
    pub date_column: Option<&'static str>,
    /// Qualified creation-timestamp column, used as ordering tiebreak.
    pub created_column: Option<&'static str>,
    pub cliente_column: Option<&'static str>,
    pub tipo_precio_column: Option<&'static str>,
    pub material_id_column: Option<&'static str>,
    pub categoria_id_column: Option<&'static str>,
    pub categoria_column: Option<&'static str>,
    pub activo_column: Option<&'static str>,
}

impl TableSpec {
    const EMPTY: Self = Self {
        name: "",
        select_sql: "",
        from_sql: "",
        id_column: "id",
        date_column: None,
        created_column: None,
        cliente_column: None,
        tipo_precio_column: None,
        material_id_column: None,
        categoria_id_column: None,
        categoria_column: None,
        activo_column: None,
    };

    /// `materiales`, ordered by categoria then nombre at the call site.
    pub const fn materiales() -> Self {
        Self {
            name: "materiales",
            select_sql: "SELECT * FROM materiales",
            from_sql: "FROM materiales",
            id_column: "id",
            created_column: Some("fecha_creacion"),
            categoria_column: Some("categoria"),
            activo_column: Some("activo"),
            ..Self::EMPTY
        }
    }

    /// General (unitemized) purchases.
    pub const fn compras_generales() -> Self {
        Self {
            name: "compras_generales",
            select_sql: "SELECT * FROM compras_generales",
            from_sql: "FROM compras_generales",
            id_column: "id",
            date_column: Some("fecha"),
            created_column: Some("fecha_creacion"),
            cliente_column: Some("cliente"),
            tipo_precio_column: Some("tipo_precio"),
            ..Self::EMPTY
        }
    }

    /// Per-material purchases, joined to the material for its name.
    pub const fn compras_materiales() -> Self {
        Self {
            name: "compras_materiales",
            select_sql: "SELECT cm.*, m.nombre AS material_nombre, m.categoria AS material_categoria \
                         FROM compras_materiales cm JOIN materiales m ON cm.material_id = m.id",
            from_sql: "FROM compras_materiales cm JOIN materiales m ON cm.material_id = m.id",
            id_column: "cm.id",
            date_column: Some("cm.fecha"),
            created_column: Some("cm.fecha_creacion"),
            cliente_column: Some("cm.cliente"),
            tipo_precio_column: Some("cm.tipo_precio"),
            material_id_column: Some("cm.material_id"),
            ..Self::EMPTY
        }
    }

    /// Sales, joined to the material for its name.
    pub const fn ventas() -> Self {
        Self {
            name: "ventas",
            select_sql: "SELECT v.*, m.nombre AS material_nombre, m.categoria AS material_categoria \
                         FROM ventas v JOIN materiales m ON v.material_id = m.id",
            from_sql: "FROM ventas v JOIN materiales m ON v.material_id = m.id",
            id_column: "v.id",
            date_column: Some("v.fecha"),
            created_column: Some("v.fecha_creacion"),
            cliente_column: Some("v.cliente"),
            material_id_column: Some("v.material_id"),
            ..Self::EMPTY
        }
    }

    /// Expense categories.
    pub const fn categorias_gastos() -> Self {
        Self {
            name: "categorias_gastos",
            select_sql: "SELECT * FROM categorias_gastos",
            from_sql: "FROM categorias_gastos",
            id_column: "id",
            activo_column: Some("activo"),
            ..Self::EMPTY
        }
    }

    /// Expenses, joined to their category for its name.
    pub const fn gastos() -> Self {
        Self {
            name: "gastos",
            select_sql: "SELECT g.*, c.nombre AS categoria_nombre \
                         FROM gastos g JOIN categorias_gastos c ON g.categoria_id = c.id",
            from_sql: "FROM gastos g JOIN categorias_gastos c ON g.categoria_id = c.id",
            id_column: "g.id",
            date_column: Some("g.fecha"),
            created_column: Some("g.fecha_creacion"),
            categoria_id_column: Some("g.categoria_id"),
            ..Self::EMPTY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joined_specs_qualify_columns() {
        let spec = TableSpec::compras_materiales();
        assert_eq!(spec.id_column, "cm.id");
        assert_eq!(spec.date_column, Some("cm.fecha"));
        assert!(spec.from_sql.contains("JOIN materiales"));
    }

    #[test]
    fn test_simple_specs_have_no_join() {
        let spec = TableSpec::compras_generales();
        assert!(!spec.from_sql.contains("JOIN"));
        assert!(spec.material_id_column.is_none());
    }

    #[test]
    fn test_filter_columns_match_table_shape() {
        assert!(TableSpec::ventas().tipo_precio_column.is_none());
        assert!(TableSpec::compras_materiales().tipo_precio_column.is_some());
        assert!(TableSpec::gastos().categoria_id_column.is_some());
        assert!(TableSpec::materiales().activo_column.is_some());
    }
}
