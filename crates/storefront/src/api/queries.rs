//! GraphQL operations and their response shapes.
//!
//! Documents live in `graphql/` and are embedded at compile time. Each
//! operation implements [`GraphQLQuery`] so it can be sent through the same
//! request/response envelopes as generated queries.

use graphql_client::{GraphQLQuery, QueryBody};
use kron_core::{CategoryId, ProductId, Region, StockStatus, UserId};
use serde::{Deserialize, Serialize};

use super::types::ProductsQuery;

// Scalar types of the storefront schema
type Decimal = String;
#[allow(clippy::upper_case_acronyms)]
type URL = String;

const PRODUCTS_DOCUMENT: &str = include_str!("../../graphql/products.graphql");
const CART_DOCUMENT: &str = include_str!("../../graphql/cart.graphql");
const UPDATE_CART_ITEM_QUANTITY_DOCUMENT: &str =
    include_str!("../../graphql/update_cart_item_quantity.graphql");
const VIEWER_DOCUMENT: &str = include_str!("../../graphql/viewer.graphql");
const AUTH_DOCUMENT: &str = include_str!("../../graphql/auth.graphql");

/// Declare an operation: a unit struct implementing [`GraphQLQuery`].
macro_rules! operation {
    ($(#[$meta:meta])* $name:ident, $document:expr, $variables:ty, $data:ty) => {
        $(#[$meta])*
        pub struct $name;

        impl GraphQLQuery for $name {
            type Variables = $variables;
            type ResponseData = $data;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: $document,
                    operation_name: stringify!($name),
                }
            }
        }
    };
}

operation!(
    /// Paginated, searchable product list.
    Products,
    PRODUCTS_DOCUMENT,
    ProductsQuery,
    ProductsData
);
operation!(
    /// The session's cart.
    Cart,
    CART_DOCUMENT,
    NoVariables,
    CartData
);
operation!(
    /// Set the absolute quantity of a cart line. Zero removes it.
    UpdateCartItemQuantity,
    UPDATE_CART_ITEM_QUANTITY_DOCUMENT,
    UpdateCartItemQuantityVariables,
    UpdateCartItemQuantityData
);
operation!(
    /// Who the current token belongs to.
    Viewer,
    VIEWER_DOCUMENT,
    NoVariables,
    ViewerData
);
operation!(Login, AUTH_DOCUMENT, LoginVariables, LoginData);
operation!(GuestLogin, AUTH_DOCUMENT, GuestLoginVariables, GuestLoginData);
operation!(
    RefreshToken,
    AUTH_DOCUMENT,
    RefreshTokenVariables,
    RefreshTokenData
);

// =============================================================================
// Variables
// =============================================================================

/// Variables of operations that take none.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NoVariables;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemQuantityVariables {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Clone, Serialize)]
pub struct LoginVariables {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginVariables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginVariables")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestLoginVariables {
    pub region_id: String,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenVariables {
    pub refresh_token: String,
}

impl std::fmt::Debug for RefreshTokenVariables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenVariables")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Response data
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfoNode {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageNode {
    pub url: URL,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: CategoryId,
    pub title: String,
    pub slug: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub ancestors: Vec<Self>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductNode {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub stock: Option<StockStatus>,
    pub multiplicity: Option<i64>,
    #[serde(default)]
    pub images: Vec<ImageNode>,
    pub category: Option<CategoryNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductConnection {
    pub edges: Vec<Edge<ProductNode>>,
    pub page_info: PageInfoNode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductsData {
    pub products: ProductConnection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemNode {
    pub id: String,
    pub quantity: i64,
    pub product: ProductNode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemConnection {
    pub edges: Vec<Edge<CartItemNode>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartNode {
    pub items: CartItemConnection,
    pub total_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartData {
    pub cart: Option<CartNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartPayload {
    pub cart: Option<CartNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemQuantityData {
    pub update_cart_item_quantity: Option<CartPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserNode {
    pub id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "__typename")]
pub enum ViewerNode {
    AuthenticatedViewer {
        user: UserNode,
        region: Option<Region>,
    },
    AnonymousViewer {
        region: Option<Region>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerData {
    pub viewer: ViewerNode,
}

/// `TokenPair | AuthError` union shared by the auth mutations.
#[derive(Clone, Deserialize)]
#[serde(tag = "__typename")]
pub enum AuthResultNode {
    TokenPair {
        #[serde(rename = "accessToken")]
        access_token: String,
        #[serde(rename = "refreshToken")]
        refresh_token: String,
    },
    AuthError {
        message: String,
    },
}

impl std::fmt::Debug for AuthResultNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenPair { .. } => f.write_str("TokenPair { .. }"),
            Self::AuthError { message } => {
                f.debug_struct("AuthError").field("message", message).finish()
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub login: AuthResultNode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestLoginData {
    pub guest_login: AuthResultNode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenData {
    pub refresh_token: AuthResultNode,
}
