//! Schema DDL and seed catalogs.
//!
//! The DDL is written once in logical form; the only engine-specific
//! pieces (primary keys, timestamp defaults, boolean defaults) are
//! filled in through [`Dialect`]. Backends run these statements
//! best-effort at startup.

use crate::dialect::Dialect;

/// The initial expense categories, (nombre, descripcion).
pub const SEED_CATEGORIAS_GASTOS: &[(&str, &str)] = &[
    ("Sueldos", "Pagos de salarios y prestaciones"),
    ("Gas Camión", "Combustible para vehículos"),
    ("Alimentación", "Gastos de comida y bebidas"),
    ("Otros", "Gastos varios y misceláneos"),
    ("Mantenimiento", "Reparaciones y mantenimiento"),
    ("Servicios", "Agua, luz, internet, etc."),
];

/// The initial material catalog, (nombre, categoria). Prices start at
/// zero and are maintained through the API.
pub const SEED_MATERIALES: &[(&str, &str)] = &[
    ("Chatarra", "Metales"),
    ("Cobre #1", "Metales-Cobre"),
    ("Cobre #2", "Metales-Cobre"),
    ("Radiador de Cobre", "Metales-Cobre"),
    ("Bronce Limpio", "Metales-Bronce"),
    ("Bronce Pintado", "Metales-Bronce"),
    ("Acero Grueso Limpio", "Metales-Acero"),
    ("Grueso Sucio", "Metales-Acero"),
    ("Olla Limpia", "Metales-Ollas"),
    ("Olla Sucia", "Metales-Ollas"),
    ("Perfil Limpio", "Metales-Perfiles"),
    ("Perfil Sucio", "Metales-Perfiles"),
    ("Guaya", "Metales-Varios"),
    ("Antimonio", "Metales-Varios"),
    ("Radiador Aluminio", "Metales-Aluminio"),
    ("Plancha", "Metales-Aluminio"),
    ("Rin Carro", "Metales-Aluminio"),
    ("Rin Cicla", "Metales-Aluminio"),
    ("Aerosol Limpio", "Metales-Aluminio"),
    ("Cartón", "Papeles"),
    ("Archivo", "Papeles"),
    ("PET", "Plásticos"),
    ("Ambar", "Plásticos"),
    ("Tapas", "Plásticos"),
    ("Canecas", "Plásticos"),
    ("Vasija Verde", "Plásticos"),
    ("Soplado", "Plásticos"),
    ("Aceite", "Plásticos"),
    ("PVC Tubo", "Plásticos"),
    ("PVC Techo", "Plásticos"),
    ("PVC Blando", "Plásticos"),
    ("Plástico", "Plásticos"),
    ("Acrílico", "Plásticos"),
    ("Vidrio", "Vidrios"),
    ("Clausen", "Vidrios"),
    ("Baterias Taxi 22", "Baterías"),
    ("Baterias 24", "Baterías"),
    ("Baterias 27", "Baterías"),
    ("Bateria 30H", "Baterías"),
    ("Baterias 4D", "Baterías"),
    ("Baterias 8D", "Baterías"),
    ("Moto Plomo", "Baterías"),
    ("Balancines", "Baterías"),
    ("Baterias Polimero (no inflada)", "Baterías-Electrónicos"),
    ("Baterias Celular (no inflada)", "Baterías-Electrónicos"),
    ("Bateria Portatil (no inflada)", "Baterías-Electrónicos"),
    ("CD", "Electrónicos"),
    ("Disco Duro", "Electrónicos"),
    ("Tarjeta Bajo Marrón", "Electrónicos-Tarjetas"),
    ("Tarjeta Bajo Verde", "Electrónicos-Tarjetas"),
    ("Tarjeta Decodificador", "Electrónicos-Tarjetas"),
    ("Tarjeta Modem", "Electrónicos-Tarjetas"),
    ("Tarjeta Tipo #1", "Electrónicos-Tarjetas"),
    ("Tarjeta Pentium", "Electrónicos-Tarjetas"),
    ("Tarjeta Tablet", "Electrónicos-Tarjetas"),
    ("Tarjeta Celular", "Electrónicos-Tarjetas"),
    ("Celular Smart", "Electrónicos-Dispositivos"),
    ("Celular Teclas", "Electrónicos-Dispositivos"),
    ("Tablet", "Electrónicos-Dispositivos"),
    ("RAM Dorada", "Electrónicos-Componentes"),
    ("Procesador UND", "Electrónicos-Componentes"),
];

/// All CREATE TABLE statements, in dependency order.
pub fn create_tables(dialect: Dialect) -> Vec<String> {
    let pk = dialect.autoincrement_pk();
    let ts = dialect.timestamp_default();
    let t = dialect.bool_literal(true);

    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS materiales (\n\
             id {pk},\n\
             nombre VARCHAR(100) NOT NULL UNIQUE,\n\
             categoria VARCHAR(50) NOT NULL,\n\
             precio_ordinario DECIMAL(10,2) DEFAULT 0,\n\
             precio_camion DECIMAL(10,2) DEFAULT 0,\n\
             precio_noche DECIMAL(10,2) DEFAULT 0,\n\
             activo BOOLEAN DEFAULT {t},\n\
             fecha_creacion {ts},\n\
             fecha_actualizacion {ts}\n\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS compras_generales (\n\
             id {pk},\n\
             fecha DATE NOT NULL,\n\
             total_pesos DECIMAL(12,2) NOT NULL,\n\
             tipo_precio VARCHAR(20) NOT NULL,\n\
             cliente VARCHAR(100),\n\
             observaciones TEXT,\n\
             fecha_creacion {ts}\n\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS compras_materiales (\n\
             id {pk},\n\
             material_id INTEGER NOT NULL,\n\
             fecha DATE NOT NULL,\n\
             kilos DECIMAL(10,3) NOT NULL,\n\
             precio_kilo DECIMAL(10,2) NOT NULL,\n\
             total_pesos DECIMAL(12,2) NOT NULL,\n\
             tipo_precio VARCHAR(20) NOT NULL,\n\
             cliente VARCHAR(100),\n\
             observaciones TEXT,\n\
             fecha_creacion {ts},\n\
             FOREIGN KEY (material_id) REFERENCES materiales(id)\n\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS ventas (\n\
             id {pk},\n\
             material_id INTEGER NOT NULL,\n\
             fecha DATE NOT NULL,\n\
             kilos DECIMAL(10,3) NOT NULL,\n\
             precio_kilo DECIMAL(10,2) NOT NULL,\n\
             total_pesos DECIMAL(12,2) NOT NULL,\n\
             cliente VARCHAR(100),\n\
             observaciones TEXT,\n\
             fecha_creacion {ts},\n\
             FOREIGN KEY (material_id) REFERENCES materiales(id)\n\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS categorias_gastos (\n\
             id {pk},\n\
             nombre VARCHAR(50) NOT NULL UNIQUE,\n\
             descripcion TEXT,\n\
             activo BOOLEAN DEFAULT {t}\n\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS gastos (\n\
             id {pk},\n\
             categoria_id INTEGER NOT NULL,\n\
             fecha DATE NOT NULL,\n\
             concepto VARCHAR(200) NOT NULL,\n\
             valor DECIMAL(12,2) NOT NULL,\n\
             observaciones TEXT,\n\
             fecha_creacion {ts},\n\
             FOREIGN KEY (categoria_id) REFERENCES categorias_gastos(id)\n\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS usuarios (\n\
             id {pk},\n\
             nombre VARCHAR(100) NOT NULL,\n\
             email VARCHAR(255) UNIQUE NOT NULL,\n\
             password_hash VARCHAR(255) NOT NULL,\n\
             rol VARCHAR(50) DEFAULT 'usuario',\n\
             activo BOOLEAN DEFAULT {t},\n\
             fecha_creacion {ts},\n\
             fecha_actualizacion {ts},\n\
             ultimo_acceso TIMESTAMP NULL,\n\
             intentos_fallidos INTEGER DEFAULT 0,\n\
             bloqueado_hasta TIMESTAMP NULL\n\
             )"
        ),
    ]
}

/// Secondary indexes over the hot filter columns.
pub fn create_indexes(_dialect: Dialect) -> Vec<String> {
    [
        ("idx_compras_generales_fecha", "compras_generales", "fecha"),
        ("idx_compras_materiales_fecha", "compras_materiales", "fecha"),
        (
            "idx_compras_materiales_material",
            "compras_materiales",
            "material_id",
        ),
        ("idx_ventas_fecha", "ventas", "fecha"),
        ("idx_ventas_material", "ventas", "material_id"),
        ("idx_gastos_fecha", "gastos", "fecha"),
        ("idx_gastos_categoria", "gastos", "categoria_id"),
        ("idx_materiales_categoria", "materiales", "categoria"),
        ("idx_usuarios_email", "usuarios", "email"),
    ]
    .iter()
    .map(|(name, table, col)| format!("CREATE INDEX IF NOT EXISTS {name} ON {table} ({col})"))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_ddl_uses_sqlite_fragments() {
        let ddl = create_tables(Dialect::Sqlite);
        assert_eq!(ddl.len(), 7);
        assert!(ddl[0].contains("INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(ddl[0].contains("BOOLEAN DEFAULT 1"));
        assert!(ddl[0].contains("DATETIME DEFAULT CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_postgres_ddl_uses_postgres_fragments() {
        let ddl = create_tables(Dialect::Postgres);
        assert!(ddl[0].contains("SERIAL PRIMARY KEY"));
        assert!(ddl[0].contains("BOOLEAN DEFAULT TRUE"));
        assert!(ddl[0].contains("TIMESTAMP DEFAULT CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_seed_catalog_sizes() {
        assert_eq!(SEED_MATERIALES.len(), 61);
        assert_eq!(SEED_CATEGORIAS_GASTOS.len(), 6);
    }

    #[test]
    fn test_seed_names_are_unique() {
        let mut names: Vec<&str> = SEED_MATERIALES.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SEED_MATERIALES.len());
    }

    #[test]
    fn test_indexes_are_idempotent() {
        for idx in create_indexes(Dialect::Sqlite) {
            assert!(idx.starts_with("CREATE INDEX IF NOT EXISTS"));
        }
    }
}
