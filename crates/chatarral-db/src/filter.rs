//! Query parameter normalization.
//!
//! Raw query strings arrive as `Option<String>` fields on
//! [`RawListParams`]; [`ListFilter::from_raw`] validates and converts
//! them into typed form. This is the only place list-endpoint input is
//! interpreted, so every route gets the same date parsing, the same
//! pagination clamping, and the same Spanish error messages.

use chatarral_core::{Error, Result};
use chrono::NaiveDate;

/// Default page size when `limite` is absent.
pub const DEFAULT_LIMIT: u32 = 100;

/// Hard cap on `limite`; larger requests are clamped, not rejected.
pub const MAX_LIMIT: u32 = 500;

/// The three price tiers a material carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoPrecio {
    Ordinario,
    Camion,
    Noche,
}

impl TipoPrecio {
    /// Parses the wire form. Anything outside the closed set is a
    /// validation error.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ordinario" => Ok(Self::Ordinario),
            "camion" => Ok(Self::Camion),
            "noche" => Ok(Self::Noche),
            other => Err(Error::validation(format!(
                "tipo_precio inválido: '{other}' (use ordinario, camion o noche)"
            ))),
        }
    }

    /// The wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ordinario => "ordinario",
            Self::Camion => "camion",
            Self::Noche => "noche",
        }
    }

    /// Column name holding this tier's price on `materiales`.
    pub const fn price_column(self) -> &'static str {
        match self {
            Self::Ordinario => "precio_ordinario",
            Self::Camion => "precio_camion",
            Self::Noche => "precio_noche",
        }
    }
}

/// Raw list-endpoint query parameters, exactly as deserialized from the
/// query string. Everything is optional and stringly typed here.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RawListParams {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub tipo_precio: Option<String>,
    pub material_id: Option<String>,
    pub categoria_id: Option<String>,
    pub cliente: Option<String>,
    pub categoria: Option<String>,
    pub activo: Option<String>,
    pub pagina: Option<String>,
    pub limite: Option<String>,
}

/// Canonical, validated list filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_fin: Option<NaiveDate>,
    pub tipo_precio: Option<TipoPrecio>,
    pub material_id: Option<i64>,
    pub categoria_id: Option<i64>,
    /// Substring match against the cliente column.
    pub cliente: Option<String>,
    /// Exact match against a categoria text column.
    pub categoria: Option<String>,
    pub activo: Option<bool>,
    /// 1-based page number.
    pub pagina: u32,
    /// Page size, already clamped to [`MAX_LIMIT`].
    pub limite: u32,
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("{field} inválida: '{raw}' (use YYYY-MM-DD)")))
}

fn parse_id(field: &str, raw: &str) -> Result<i64> {
    let id: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::validation(format!("{field} inválido: '{raw}'")))?;
    if id <= 0 {
        return Err(Error::validation(format!("{field} debe ser positivo")));
    }
    Ok(id)
}

fn parse_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::validation(format!(
            "{field} inválido: '{other}' (use true o false)"
        ))),
    }
}

impl ListFilter {
    /// Validates and converts raw query parameters.
    ///
    /// Defaults: pagina 1, limite [`DEFAULT_LIMIT`]. `limite` above
    /// [`MAX_LIMIT`] is clamped. `fecha_fin` before `fecha_inicio` is
    /// rejected. Blank strings count as absent.
    pub fn from_raw(raw: &RawListParams) -> Result<Self> {
        let non_blank = |s: &Option<String>| -> Option<String> {
            s.as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(ToString::to_string)
        };

        let fecha_inicio = non_blank(&raw.fecha_inicio)
            .map(|s| parse_date("fecha_inicio", &s))
            .transpose()?;
        let fecha_fin = non_blank(&raw.fecha_fin)
            .map(|s| parse_date("fecha_fin", &s))
            .transpose()?;
        if let (Some(inicio), Some(fin)) = (fecha_inicio, fecha_fin) {
            if fin < inicio {
                return Err(Error::validation(
                    "fecha_fin no puede ser anterior a fecha_inicio",
                ));
            }
        }

        let tipo_precio = non_blank(&raw.tipo_precio)
            .map(|s| TipoPrecio::parse(&s))
            .transpose()?;
        let material_id = non_blank(&raw.material_id)
            .map(|s| parse_id("material_id", &s))
            .transpose()?;
        let categoria_id = non_blank(&raw.categoria_id)
            .map(|s| parse_id("categoria_id", &s))
            .transpose()?;
        let activo = non_blank(&raw.activo)
            .map(|s| parse_bool("activo", &s))
            .transpose()?;

        let pagina = match non_blank(&raw.pagina) {
            Some(s) => {
                let p: u32 = s
                    .parse()
                    .map_err(|_| Error::validation(format!("pagina inválida: '{s}'")))?;
                if p == 0 {
                    return Err(Error::validation("pagina debe ser mayor o igual a 1"));
                }
                p
            }
            None => 1,
        };

        let limite = match non_blank(&raw.limite) {
            Some(s) => {
                let l: u32 = s
                    .parse()
                    .map_err(|_| Error::validation(format!("limite inválido: '{s}'")))?;
                if l == 0 {
                    return Err(Error::validation("limite debe ser mayor o igual a 1"));
                }
                l.min(MAX_LIMIT)
            }
            None => DEFAULT_LIMIT,
        };

        Ok(Self {
            fecha_inicio,
            fecha_fin,
            tipo_precio,
            material_id,
            categoria_id,
            cliente: non_blank(&raw.cliente),
            categoria: non_blank(&raw.categoria),
            activo,
            pagina,
            limite,
        })
    }

    /// Row offset implied by pagina and limite. Computed in i64 so an
    /// extreme pagina cannot overflow.
    pub fn offset(&self) -> i64 {
        (i64::from(self.pagina) - 1) * i64::from(self.limite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawListParams {
        RawListParams::default()
    }

    #[test]
    fn test_defaults() {
        let f = ListFilter::from_raw(&raw()).unwrap();
        assert_eq!(f.pagina, 1);
        assert_eq!(f.limite, DEFAULT_LIMIT);
        assert_eq!(f.offset(), 0);
        assert!(f.fecha_inicio.is_none());
    }

    #[test]
    fn test_date_parsing() {
        let mut r = raw();
        r.fecha_inicio = Some("2024-01-15".to_string());
        let f = ListFilter::from_raw(&r).unwrap();
        assert_eq!(
            f.fecha_inicio,
            Some(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
    }

    #[test]
    fn test_bad_date_rejected() {
        let mut r = raw();
        r.fecha_inicio = Some("15/01/2024".to_string());
        let err = ListFilter::from_raw(&r).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("fecha_inicio"));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut r = raw();
        r.fecha_inicio = Some("2024-02-01".to_string());
        r.fecha_fin = Some("2024-01-01".to_string());
        assert!(ListFilter::from_raw(&r).is_err());
    }

    #[test]
    fn test_tipo_precio_closed_set() {
        assert_eq!(TipoPrecio::parse("camion").unwrap(), TipoPrecio::Camion);
        assert!(TipoPrecio::parse("mayorista").is_err());
    }

    #[test]
    fn test_price_column_mapping() {
        assert_eq!(TipoPrecio::Noche.price_column(), "precio_noche");
        assert_eq!(TipoPrecio::Ordinario.price_column(), "precio_ordinario");
    }

    #[test]
    fn test_limit_clamped_not_rejected() {
        let mut r = raw();
        r.limite = Some("9999".to_string());
        let f = ListFilter::from_raw(&r).unwrap();
        assert_eq!(f.limite, MAX_LIMIT);
    }

    #[test]
    fn test_zero_page_rejected() {
        let mut r = raw();
        r.pagina = Some("0".to_string());
        assert!(ListFilter::from_raw(&r).is_err());
    }

    #[test]
    fn test_offset_computation() {
        let mut r = raw();
        r.pagina = Some("3".to_string());
        r.limite = Some("25".to_string());
        let f = ListFilter::from_raw(&r).unwrap();
        assert_eq!(f.offset(), 50);
    }

    #[test]
    fn test_offset_extreme_page_does_not_overflow() {
        let mut r = raw();
        r.pagina = Some(u32::MAX.to_string());
        r.limite = Some("500".to_string());
        let f = ListFilter::from_raw(&r).unwrap();
        assert_eq!(f.offset(), (i64::from(u32::MAX) - 1) * 500);
    }

    #[test]
    fn test_blank_strings_are_absent() {
        let mut r = raw();
        r.cliente = Some("   ".to_string());
        r.activo = Some(String::new());
        let f = ListFilter::from_raw(&r).unwrap();
        assert!(f.cliente.is_none());
        assert!(f.activo.is_none());
    }

    #[test]
    fn test_activo_forms() {
        let mut r = raw();
        r.activo = Some("true".to_string());
        assert_eq!(ListFilter::from_raw(&r).unwrap().activo, Some(true));
        r.activo = Some("0".to_string());
        assert_eq!(ListFilter::from_raw(&r).unwrap().activo, Some(false));
        r.activo = Some("si".to_string());
        assert!(ListFilter::from_raw(&r).is_err());
    }

    #[test]
    fn test_negative_id_rejected() {
        let mut r = raw();
        r.material_id = Some("-3".to_string());
        assert!(ListFilter::from_raw(&r).is_err());
    }
}
