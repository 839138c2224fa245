use serde::{Deserialize, Serialize};

/// An order.
#[derive(Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    #[serde(rename = "customer")]
    pub buyer: Customer,
    /// Free-form note.
    pub note: Option<String>,
    pub lines: Vec<Line>,
}

#[derive(Serialize, Deserialize)]
pub struct Line {
    pub sku: String,
    pub quantity: u32,
}

#[derive(Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    #[serde(skip)]
    pub password_hash: String,
}
