//! Yahoo quoteSummary response models.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResponse {
    pub quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
pub struct QuoteSummary {
    #[serde(default)]
    pub result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResult {
    pub price: Option<PriceModule>,
    pub summary_detail: Option<SummaryDetail>,
    pub summary_profile: Option<SummaryProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceModule {
    pub currency: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub regular_market_price: Option<RawValue>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`, or `{}` when absent.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RawValue {
    pub raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDetail {
    pub fifty_two_week_high: Option<RawValue>,
    pub fifty_two_week_low: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryProfile {
    pub sector: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_quote_summary() {
        let json = r#"{
            "quoteSummary": {
                "result": [{
                    "price": {
                        "currency": "INR",
                        "longName": "Infosys Limited",
                        "regularMarketPrice": {"raw": 1502.35, "fmt": "1,502.35"}
                    },
                    "summaryDetail": {
                        "fiftyTwoWeekHigh": {"raw": 1733.0},
                        "fiftyTwoWeekLow": {}
                    },
                    "summaryProfile": {"sector": "Technology"}
                }],
                "error": null
            }
        }"#;

        let response: QuoteSummaryResponse = serde_json::from_str(json).unwrap();
        let result = &response.quote_summary.result.unwrap()[0];
        let price = result.price.as_ref().unwrap();
        assert_eq!(price.regular_market_price.unwrap().raw, Some(1502.35));
        let detail = result.summary_detail.as_ref().unwrap();
        assert_eq!(detail.fifty_two_week_low.unwrap().raw, None);
        assert_eq!(
            result.summary_profile.as_ref().unwrap().sector.as_deref(),
            Some("Technology")
        );
    }

    #[test]
    fn test_deserialize_not_found_result() {
        let json = r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found"}}}"#;
        let response: QuoteSummaryResponse = serde_json::from_str(json).unwrap();
        assert!(response.quote_summary.result.is_none());
    }
}
