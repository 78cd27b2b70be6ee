use crate::config::MarketTables;
use crate::error::HotPairsError;
use crate::models::session::Quote;

/// Amount of the payment unit owed for `usd`, rounded to 4 decimals.
pub fn crypto_amount(usd: f64, unit: &str, unit_price: f64) -> Result<f64, HotPairsError> {
    if !unit_price.is_finite() || unit_price <= 0.0 {
        return Err(HotPairsError::InvalidPrice(unit.to_string()));
    }
    Ok(((usd / unit_price) * 10_000.0).round() / 10_000.0)
}

/// Price the `package` placement on `network` from the static tables.
pub fn quote(market: &MarketTables, network: &str, package: &str) -> Result<Quote, HotPairsError> {
    let net = market
        .network(network)
        .ok_or_else(|| HotPairsError::UnknownNetwork(network.to_string()))?;
    let pkg = market
        .package(package)
        .ok_or_else(|| HotPairsError::UnknownPackage(package.to_string()))?;
    let unit_price = market
        .unit_price(&net.payment_unit)
        .ok_or_else(|| HotPairsError::InvalidPrice(net.payment_unit.clone()))?;

    Ok(Quote {
        network: net.key.clone(),
        duration: pkg.label.clone(),
        usd_price: pkg.usd,
        crypto_amount: crypto_amount(pkg.usd, &net.payment_unit, unit_price)?,
        payment_unit: net.payment_unit.clone(),
    })
}
