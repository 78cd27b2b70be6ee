use serde::{Deserialize, Serialize};

use crate::models::pair::PairSnapshot;

/// A placement package on sale, e.g. `6h` for $2000.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub label: String,
    pub usd: f64,
}

/// Price of a package on a given network, fixed when the customer picks a duration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub network: String,
    pub duration: String,
    pub usd_price: f64,
    pub crypto_amount: f64,
    pub payment_unit: String,
}

impl Quote {
    pub fn with_token(self, contract_address: String, pair: PairSnapshot) -> Session {
        Session {
            network: self.network,
            duration: self.duration,
            usd_price: self.usd_price,
            crypto_amount: self.crypto_amount,
            payment_unit: self.payment_unit,
            contract_address,
            pair,
        }
    }
}

/// Everything collected from one customer conversation. Lives in dialogue
/// storage and is dropped when the order is submitted or restarted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub network: String,
    pub duration: String,
    pub usd_price: f64,
    pub crypto_amount: f64,
    pub payment_unit: String,
    pub contract_address: String,
    pub pair: PairSnapshot,
}
