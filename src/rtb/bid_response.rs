use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single bid against one impression.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder, PartialEq)]
#[builder(default, setter(into))]
pub struct Bid {
    pub id: String,
    pub impid: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub cur: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// A group of bids attributed to one seat. `seat` is empty for
/// exchange-grouped demand (see [`crate::auction::settlement`]).
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder, PartialEq)]
#[builder(default, setter(into))]
pub struct SeatBid {
    pub seat: String,
    pub bid: Vec<Bid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default, setter(into))]
pub struct BidResponse {
    pub id: String,
    pub seatbid: Vec<SeatBid>,
    #[serde(default = "default_currency")]
    pub cur: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbr: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}
