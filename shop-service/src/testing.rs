use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::Utc;
use shared::catalog::slugify;
use shared::{CartLine, Product, Role, VariantSelection};
use uuid::Uuid;

use crate::store::{Store, User};

pub async fn seed_user(store: &dyn Store, email: &str) -> User {
    seed_user_with_role(store, email, Role::User).await
}

pub async fn seed_user_with_role(store: &dyn Store, email: &str, role: Role) -> User {
    // Not a real argon2 hash; login tests register through the API instead.
    let user = User::local("Test User".to_string(), email.to_string(), "unused".to_string(), role);
    store.insert_user(&user).await.unwrap();
    user
}

pub fn product(title: &str, price: &str, stock: i32) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        title: title.to_string(),
        slug: slugify(title),
        description: format!("{title} in heavyweight cotton"),
        images: vec![format!("https://cdn.example.com/{}.jpg", slugify(title))],
        price: BigDecimal::from_str(price).unwrap(),
        compare_at_price: None,
        discount_percent: None,
        category: "apparel".to_string(),
        stock,
        variants: Vec::new(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub async fn seed_product(store: &dyn Store, title: &str, price: &str, stock: i32) -> Product {
    let product = product(title, price, stock);
    store.insert_product(&product).await.unwrap();
    product
}

pub async fn add_to_cart(store: &dyn Store, user_id: Uuid, product: &Product, qty: i32) -> CartLine {
    let now = Utc::now();
    let line = CartLine {
        id: Uuid::new_v4(),
        user_id,
        product_id: product.id,
        title: product.title.clone(),
        price_snapshot: product.price.clone(),
        variant: VariantSelection::new(),
        qty,
        created_at: now,
        updated_at: now,
    };
    store.upsert_cart_line(&line).await.unwrap();
    line
}
