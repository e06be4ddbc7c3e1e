//! Catalog products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tienda_core::{Money, ProductId};

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    /// Path under `/static`, if the product has a photo.
    pub image: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Active and with at least one unit in stock.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.active && self.stock > 0
    }
}

/// Product data as written by seeding and catalog maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Sort order for the product listing.
///
/// The query-string values are the ones the shop has always used in links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    pub const ALL: [Self; 4] = [Self::Newest, Self::PriceAsc, Self::PriceDesc, Self::Name];

    /// Parse the `orden` query parameter; unknown values fall back to newest.
    #[must_use]
    pub fn from_param(param: Option<&str>) -> Self {
        Self::ALL
            .into_iter()
            .find(|sort| Some(sort.as_param()) == param)
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Newest => "reciente",
            Self::PriceAsc => "precio_menor",
            Self::PriceDesc => "precio_mayor",
            Self::Name => "nombre",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Más recientes",
            Self::PriceAsc => "Precio: menor a mayor",
            Self::PriceDesc => "Precio: mayor a menor",
            Self::Name => "Nombre",
        }
    }
}

/// Which active products a listing shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Case-insensitive substring of the name or description.
    pub search: Option<String>,
}

impl ProductFilter {
    /// Build a filter from raw query parameters, ignoring blank values.
    #[must_use]
    pub fn new(category: Option<&str>, search: Option<&str>) -> Self {
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        Self {
            category: clean(category),
            search: clean(search),
        }
    }

    /// Whether `product` belongs in the listing.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if !product.active {
            return false;
        }
        if let Some(category) = &self.category
            && &product.category != category
        {
            return false;
        }
        self.search.as_ref().is_none_or(|needle| {
            let needle = needle.to_lowercase();
            product.name.to_lowercase().contains(&needle)
                || product.description.to_lowercase().contains(&needle)
        })
    }

    /// `LIKE` pattern for the search term with wildcards escaped.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

/// One page of the product listing.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    /// 1-based page number actually shown (after clamping).
    pub page: u32,
    pub total_pages: u32,
    pub total_products: u64,
}

impl ProductPage {
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, category: &str, description: &str, active: bool) -> Product {
        Product {
            id: ProductId::new(1),
            name: name.to_owned(),
            category: category.to_owned(),
            description: description.to_owned(),
            price: Money::new(10_000),
            stock: 3,
            image: None,
            active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sort_param_round_trip_and_fallback() {
        for sort in ProductSort::ALL {
            assert_eq!(ProductSort::from_param(Some(sort.as_param())), sort);
        }
        assert_eq!(ProductSort::from_param(Some("popular")), ProductSort::Newest);
        assert_eq!(ProductSort::from_param(None), ProductSort::Newest);
    }

    #[test]
    fn test_filter_ignores_blank_params() {
        let filter = ProductFilter::new(Some("  "), Some(""));
        assert_eq!(filter, ProductFilter::default());
    }

    #[test]
    fn test_filter_matches_category_and_search() {
        let vela = product("Vela de soya", "velas", "Aroma lavanda", true);
        let filter = ProductFilter::new(Some("velas"), Some("LAVANDA"));
        assert!(filter.matches(&vela));

        let other_category = ProductFilter::new(Some("jabones"), None);
        assert!(!other_category.matches(&vela));

        let inactive = product("Vela de soya", "velas", "", false);
        assert!(!ProductFilter::default().matches(&inactive));
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let filter = ProductFilter::new(None, Some("50%_off"));
        assert_eq!(filter.search_pattern().as_deref(), Some("%50\\%\\_off%"));
    }
}
