//! Admin 过滤条件：订单类型 + 创建日期范围 (YYYY-MM-DD，UTC，闭区间)

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use shared::models::OrderQuery;
use shared::{Order, OrderType};

use crate::{ClientError, ClientResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminFilter {
    pub order_type: Option<OrderType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AdminFilter {
    /// all → dinein → delivery → all
    pub fn cycle_type(&mut self) {
        self.order_type = match self.order_type {
            None => Some(OrderType::Dinein),
            Some(OrderType::Dinein) => Some(OrderType::Delivery),
            Some(OrderType::Delivery) => None,
        };
    }

    /// Parse `from..to`; either side may be empty
    ///
    /// `2025-01-01..2025-01-31`, `2025-01-01..`, `..2025-01-31`, 单个日期表示当天。
    pub fn set_dates(&mut self, input: &str) -> ClientResult<()> {
        let input = input.trim();
        let (from, to) = match input.split_once("..") {
            Some((from, to)) => (parse_date(from)?, parse_date(to)?),
            None => {
                let day = parse_date(input)?;
                (day, day)
            }
        };
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ClientError::Config(format!(
                    "date range is reversed: {} > {}",
                    from, to
                )));
            }
        }
        self.from = from;
        self.to = to;
        Ok(())
    }

    pub fn query(&self) -> OrderQuery {
        OrderQuery {
            order_type: self.order_type,
            from: self
                .from
                .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN))),
            to: self.to.and_then(|d| {
                d.and_hms_milli_opt(23, 59, 59, 999)
                    .map(|t| Utc.from_utc_datetime(&t))
            }),
            ..Default::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.query().matches(order)
    }

    /// Header text, e.g. `delivery 2025-01-01..`
    pub fn describe(&self) -> String {
        let kind = self.order_type.map_or("all", |t| t.as_str());
        match (self.from, self.to) {
            (None, None) => kind.to_string(),
            (from, to) => format!(
                "{} {}..{}",
                kind,
                from.map(|d| d.to_string()).unwrap_or_default(),
                to.map(|d| d.to_string()).unwrap_or_default()
            ),
        }
    }
}

fn parse_date(raw: &str) -> ClientResult<Option<NaiveDate>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ClientError::Config(format!("invalid date {:?}, expected YYYY-MM-DD", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::OrderStatus;

    fn order_at(ts: &str, order_type: OrderType) -> Order {
        Order {
            id: "o-1".into(),
            id_user: "u-1".into(),
            items: vec![],
            total_cost: 1.0,
            status: OrderStatus::Preparing,
            order_type,
            created_at: ts.parse().unwrap(),
            updated_at: None,
            version: 1,
        }
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let mut filter = AdminFilter::default();
        filter.set_dates("2025-03-01..2025-03-02").unwrap();

        assert!(filter.matches(&order_at("2025-03-01T00:00:00Z", OrderType::Dinein)));
        assert!(filter.matches(&order_at("2025-03-02T23:59:59Z", OrderType::Dinein)));
        assert!(!filter.matches(&order_at("2025-02-28T23:59:59Z", OrderType::Dinein)));
        assert!(!filter.matches(&order_at("2025-03-03T00:00:00Z", OrderType::Dinein)));
        assert_eq!(filter.describe(), "all 2025-03-01..2025-03-02");
    }

    #[test]
    fn test_open_ended_and_single_day() {
        let mut filter = AdminFilter::default();
        filter.set_dates("2025-03-01..").unwrap();
        assert!(filter.to.is_none());
        assert!(filter.matches(&order_at("2030-01-01T00:00:00Z", OrderType::Dinein)));

        filter.set_dates("2025-03-01").unwrap();
        assert_eq!(filter.from, filter.to);
        assert!(!filter.matches(&order_at("2025-03-02T00:00:00Z", OrderType::Dinein)));

        filter.set_dates("").unwrap();
        assert_eq!(filter.query(), OrderQuery::default());
    }

    #[test]
    fn test_bad_dates_keep_previous_filter() {
        let mut filter = AdminFilter::default();
        filter.set_dates("2025-03-01..").unwrap();
        assert!(filter.set_dates("2025-13-01..").is_err());
        assert!(filter.set_dates("2025-03-05..2025-03-01").is_err());
        assert_eq!(filter.from, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn test_type_cycle_feeds_query() {
        let mut filter = AdminFilter::default();
        filter.cycle_type();
        assert_eq!(filter.query().order_type, Some(OrderType::Dinein));
        assert!(!filter.matches(&order_at("2025-03-01T00:00:00Z", OrderType::Delivery)));
        filter.cycle_type();
        filter.cycle_type();
        assert_eq!(filter.order_type, None);
        assert_eq!(filter.describe(), "all");
    }
}
