//! Pagination envelope shared by every list endpoint.

use chatarral_db::ListFilter;

/// The `paginacion` object returned alongside list payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Paginacion {
    pub pagina: u32,
    pub limite: u32,
    pub total: i64,
    pub total_paginas: i64,
}

impl Paginacion {
    pub fn new(filter: &ListFilter, total: i64) -> Self {
        let limite = i64::from(filter.limite);
        Self {
            pagina: filter.pagina,
            limite: filter.limite,
            total,
            total_paginas: (total + limite - 1) / limite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatarral_db::RawListParams;

    fn filter(pagina: &str, limite: &str) -> ListFilter {
        let raw = RawListParams {
            pagina: Some(pagina.to_string()),
            limite: Some(limite.to_string()),
            ..RawListParams::default()
        };
        ListFilter::from_raw(&raw).unwrap()
    }

    #[test]
    fn test_total_paginas_rounds_up() {
        let p = Paginacion::new(&filter("1", "10"), 31);
        assert_eq!(p.total_paginas, 4);
    }

    #[test]
    fn test_exact_division() {
        let p = Paginacion::new(&filter("2", "10"), 30);
        assert_eq!(p.total_paginas, 3);
        assert_eq!(p.pagina, 2);
    }

    #[test]
    fn test_empty_result() {
        let p = Paginacion::new(&filter("1", "10"), 0);
        assert_eq!(p.total_paginas, 0);
        assert_eq!(p.total, 0);
    }
}
