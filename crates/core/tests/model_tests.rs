// ═══════════════════════════════════════════════════════════════════
// Model Tests — row-to-domain mapping, defaults, helpers
// ═══════════════════════════════════════════════════════════════════

use serde_json::json;
use uuid::Uuid;

use research_cms_core::models::access::{AccessCode, AccessCodeRow, SharedPassword, SharedPasswordRow};
use research_cms_core::models::issue::{Issue, IssueRow};
use research_cms_core::models::portfolio::{Portfolio, PortfolioEntry, PortfolioRow, PortfolioView};
use research_cms_core::models::resource::{Resource, ResourceRow, UploadFile};
use research_cms_core::models::session::Audience;
use research_cms_core::models::stock::{Stock, StockRow};

const ID: &str = "6f9619ff-8b86-d011-b42d-00cf4fc964ff";

fn stock(row: serde_json::Value) -> Stock {
    let row: StockRow = serde_json::from_value(row).unwrap();
    row.into()
}

// ═══════════════════════════════════════════════════════════════════
// Stock
// ═══════════════════════════════════════════════════════════════════

mod stocks {
    use super::*;

    #[test]
    fn tickers_fall_back_to_primary() {
        let s = stock(json!({ "id": ID, "ticker": "005930", "name": "삼성전자" }));
        assert_eq!(s.tickers, vec!["005930".to_string()]);
    }

    #[test]
    fn explicit_tickers_win() {
        let s = stock(json!({
            "id": ID, "ticker": "005930", "tickers": ["005930", "005935"], "name": "삼성전자"
        }));
        assert_eq!(s.tickers.len(), 2);
    }

    #[test]
    fn empty_tickers_list_falls_back() {
        let s = stock(json!({ "id": ID, "ticker": "005930", "tickers": [] }));
        assert_eq!(s.tickers, vec!["005930".to_string()]);
    }

    #[test]
    fn no_ticker_no_tickers() {
        let s = stock(json!({ "id": ID, "name": "비상장" }));
        assert!(s.tickers.is_empty());
        assert_eq!(s.label(), "비상장");
    }

    #[test]
    fn null_columns_default() {
        let s = stock(json!({
            "id": ID, "ticker": "A", "name": "a", "keywords": null, "is_active": null
        }));
        assert!(s.keywords.is_empty());
        assert!(s.is_active);
    }

    #[test]
    fn label_includes_ticker() {
        let s = stock(json!({ "id": ID, "ticker": "005930", "name": "삼성전자" }));
        assert_eq!(s.label(), "삼성전자 (005930)");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Issues, portfolios, resources, access
// ═══════════════════════════════════════════════════════════════════

mod content {
    use super::*;

    #[test]
    fn issue_date_falls_back_to_created_at() {
        let row: IssueRow = serde_json::from_value(json!({
            "id": ID, "title": "t", "created_at": "2026-05-04T10:00:00Z"
        }))
        .unwrap();
        let issue = Issue::from(row);
        assert_eq!(issue.issue_date.unwrap().to_string(), "2026-05-04");
        assert!(issue.is_published);
        assert_eq!(issue.content, "");
    }

    #[test]
    fn resource_blank_category_is_general() {
        let row: ResourceRow =
            serde_json::from_value(json!({ "id": ID, "title": "r", "category": " " })).unwrap();
        assert_eq!(Resource::from(row).category, "general");
    }

    #[test]
    fn upload_extension() {
        assert_eq!(
            UploadFile::new("Report.Final.PDF", "application/pdf", vec![]).extension(),
            Some("pdf".to_string())
        );
        assert_eq!(UploadFile::new(".env", "text/plain", vec![]).extension(), None);
        assert_eq!(UploadFile::new("trailing.", "text/plain", vec![]).extension(), None);
    }

    #[test]
    fn portfolio_defaults_and_weights() {
        let row: PortfolioRow = serde_json::from_value(json!({ "id": ID, "name": "p" })).unwrap();
        let portfolio = Portfolio::from(row);
        assert!(portfolio.is_active);
        assert_eq!(portfolio.sort_order, 0);

        let s = stock(json!({ "id": Uuid::new_v4().to_string(), "ticker": "A", "name": "a" }));
        let view = PortfolioView {
            portfolio,
            entries: vec![
                PortfolioEntry { stock: s.clone(), weight: Some(40.0) },
                PortfolioEntry { stock: s, weight: None },
            ],
        };
        assert!((view.total_weight() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn shared_password_defaults_inactive() {
        let row: SharedPasswordRow =
            serde_json::from_value(json!({ "id": ID, "password": "x" })).unwrap();
        assert!(!SharedPassword::from(row).is_active);
    }

    #[test]
    fn access_code_masking() {
        let row: AccessCodeRow =
            serde_json::from_value(json!({ "id": ID, "code": "abc" })).unwrap();
        let code = AccessCode::from(row);
        assert!(code.is_active);
        assert_eq!(code.masked(), "abc");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Audience
// ═══════════════════════════════════════════════════════════════════

mod audience {
    use super::*;

    #[test]
    fn keys_are_disjoint() {
        let client = Audience::Client.keys().all();
        let admin = Audience::Admin.keys().all();
        assert!(client.iter().all(|k| !admin.contains(k)));
    }

    #[test]
    fn verify_procedures() {
        assert_eq!(Audience::Client.verify_rpc(), "verify_access_code");
        assert_eq!(Audience::Admin.verify_rpc(), "verify_admin_code");
    }

    #[test]
    fn display() {
        assert_eq!(Audience::Admin.to_string(), "Admin");
    }
}
