//! Wire-to-domain conversions.

use std::str::FromStr;

use kron_core::{Category, Price, Product, ProductImage};
use secrecy::SecretString;

use super::ApiError;
use super::queries::{
    AuthResultNode, CartNode, CategoryNode, PageInfoNode, ProductConnection, ProductNode,
    UserNode, ViewerNode,
};
use super::types::{PageInfo, ProductPage, TokenPair, Viewer, ViewerUser};
use crate::cart::{CartItemUnified, CartUnified};

fn parse_price(raw: &str, field: &str, product: &ProductNode) -> Result<Price, ApiError> {
    Price::from_str(raw).map_err(|e| {
        ApiError::InvalidData(format!("{field} of product {}: {e}", product.id))
    })
}

fn convert_category(node: CategoryNode) -> Category {
    Category {
        id: node.id,
        title: node.title,
        slug: node.slug,
        icon: node.icon,
        ancestors: node.ancestors.into_iter().map(convert_category).collect(),
    }
}

pub fn convert_product(node: ProductNode) -> Result<Product, ApiError> {
    let price = parse_price(&node.price, "price", &node)?;
    let old_price = node
        .old_price
        .as_deref()
        .map(|raw| parse_price(raw, "oldPrice", &node))
        .transpose()?;

    Ok(Product {
        id: node.id,
        name: node.name,
        description: node.description.filter(|d| !d.trim().is_empty()),
        price,
        old_price,
        stock: node.stock.unwrap_or_default(),
        category: node.category.map(convert_category),
        // Non-positive or oversized steps fall back to the default step
        multiplicity: node
            .multiplicity
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| *m > 0),
        images: node
            .images
            .into_iter()
            .map(|image| ProductImage {
                url: image.url,
                alt_text: image.alt,
            })
            .collect(),
    })
}

fn convert_page_info(info: PageInfoNode) -> PageInfo {
    PageInfo {
        has_next_page: info.has_next_page,
        end_cursor: info.end_cursor,
    }
}

pub fn convert_product_connection(connection: ProductConnection) -> Result<ProductPage, ApiError> {
    let products = connection
        .edges
        .into_iter()
        .map(|edge| convert_product(edge.node))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProductPage {
        products,
        page_info: convert_page_info(connection.page_info),
    })
}

/// Convert a server cart. Totals are recomputed from the lines unless the
/// server sent its own total price.
pub fn convert_cart(node: CartNode) -> Result<CartUnified, ApiError> {
    let items = node
        .items
        .edges
        .into_iter()
        .map(|edge| {
            let item = edge.node;
            let quantity = u32::try_from(item.quantity).map_err(|_| {
                ApiError::InvalidData(format!(
                    "quantity {} of cart item {}",
                    item.quantity, item.id
                ))
            })?;
            convert_product(item.product).map(|product| CartItemUnified::new(product, quantity))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut cart = CartUnified::from_items(items);
    if let Some(total) = node.total_price {
        cart.total_price = Price::from_str(&total)
            .map_err(|e| ApiError::InvalidData(format!("cart totalPrice: {e}")))?;
    }
    Ok(cart)
}

fn convert_user(user: UserNode) -> ViewerUser {
    ViewerUser {
        id: user.id,
        email: user.email,
        name: user.name,
    }
}

pub fn convert_viewer(node: ViewerNode) -> Viewer {
    match node {
        ViewerNode::AuthenticatedViewer { user, region } => Viewer::Authenticated {
            user: convert_user(user),
            region,
        },
        ViewerNode::AnonymousViewer { region } => Viewer::Anonymous { region },
    }
}

pub fn convert_auth_result(node: AuthResultNode) -> Result<TokenPair, ApiError> {
    match node {
        AuthResultNode::TokenPair {
            access_token,
            refresh_token,
        } => Ok(TokenPair {
            access_token: SecretString::from(access_token),
            refresh_token: SecretString::from(refresh_token),
        }),
        AuthResultNode::AuthError { message } => Err(ApiError::Auth(message)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kron_core::StockStatus;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::api::queries::CartData;

    const CART_JSON: &str = r#"{
        "cart": {
            "items": {"edges": [
                {"node": {"id": "line-1", "quantity": 2, "product": {
                    "id": "p1", "name": "Лопата штыковая", "price": "100", "stock": "IN_STOCK",
                    "multiplicity": 0,
                    "images": [{"url": "https://cdn.example/p1.jpg", "alt": null}],
                    "category": {"id": "c2", "title": "Лопаты", "slug": "lopaty", "icon": null,
                        "ancestors": [{"id": "c1", "title": "Садовый инвентарь", "slug": "sad", "icon": null}]}
                }}},
                {"node": {"id": "line-2", "quantity": 1, "product": {
                    "id": "p2", "name": "Ведро", "price": "50", "oldPrice": "70", "stock": null
                }}}
            ]},
            "totalPrice": "250.00"
        }
    }"#;

    #[test]
    fn test_convert_cart() {
        let data: CartData = serde_json::from_str(CART_JSON).unwrap();
        let cart = convert_cart(data.cart.unwrap()).unwrap();

        assert_eq!(cart.total_items, 3);
        assert_eq!(cart.total_price, Price::from_units(250));
        assert_eq!(cart.items.first().unwrap().id, "p1");

        let shovel = &cart.items.first().unwrap().product;
        assert_eq!(shovel.multiplicity, None);
        assert_eq!(shovel.category.as_ref().unwrap().ancestors.len(), 1);

        let bucket = &cart.items.get(1).unwrap().product;
        assert_eq!(bucket.stock, StockStatus::InStock);
        assert!(bucket.is_on_sale());
    }

    #[test]
    fn test_invalid_price_is_rejected() {
        let node: ProductNode =
            serde_json::from_str(r#"{"id": "p1", "name": "x", "price": "abc"}"#).unwrap();
        assert!(matches!(convert_product(node), Err(ApiError::InvalidData(_))));
    }

    #[test]
    fn test_negative_quantity_is_rejected() {
        let data: CartData = serde_json::from_str(
            r#"{"cart": {"items": {"edges": [{"node": {"id": "l", "quantity": -1,
                "product": {"id": "p", "name": "x", "price": "1"}}}]}}}"#,
        )
        .unwrap();
        assert!(convert_cart(data.cart.unwrap()).is_err());
    }

    #[test]
    fn test_auth_error_variant() {
        let err = convert_auth_result(AuthResultNode::AuthError {
            message: "Wrong password".into(),
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Authentication failed: Wrong password");

        let tokens = convert_auth_result(AuthResultNode::TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        })
        .unwrap();
        assert_eq!(tokens.access_token.expose_secret(), "a");
    }
}
