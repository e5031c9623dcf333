//! Request and result types of the storefront API.

use kron_core::{CategoryId, Product, Region, UserId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Product list ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductSort {
    Popular,
    PriceAsc,
    PriceDesc,
    Newest,
    Name,
}

/// Variables of the `Products` query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<ProductSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl ProductsQuery {
    /// First `first` products matching a free-text search.
    #[must_use]
    pub fn search(search: impl Into<String>, first: i64) -> Self {
        Self {
            search: Some(search.into()),
            first: Some(first),
            ..Self::default()
        }
    }
}

/// Pagination cursor state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// One page of products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page_info: PageInfo,
}

/// Tokens issued by login, guest login and refresh.
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

/// The logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerUser {
    pub id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Who the current token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    Authenticated {
        user: ViewerUser,
        region: Option<Region>,
    },
    Anonymous {
        region: Option<Region>,
    },
}

impl Viewer {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    #[must_use]
    pub const fn region(&self) -> Option<&Region> {
        match self {
            Self::Authenticated { region, .. } | Self::Anonymous { region } => region.as_ref(),
        }
    }
}
