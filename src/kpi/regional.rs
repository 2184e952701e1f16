use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::{error::KpiError, model::EnrichedOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionalRevenue {
    /// `None` collects unmatched orders and customers without a region.
    pub region: Option<String>,
    pub revenue: Decimal,
}

/// Revenue per customer region under left-join semantics. Named regions sort
/// ascending; the absent-region bucket, if any, comes last.
pub fn regional_revenue(view: &[EnrichedOrder]) -> Result<Vec<RegionalRevenue>, KpiError> {
    let mut totals: HashMap<Option<&str>, Decimal> = HashMap::new();
    for row in view {
        let amount = row.order.total_amount.value(row.order.order_id)?;
        *totals.entry(row.region()).or_insert(Decimal::ZERO) += amount;
    }
    let mut rows: Vec<RegionalRevenue> = totals
        .into_iter()
        .map(|(region, revenue)| RegionalRevenue {
            region: region.map(str::to_string),
            revenue,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.region
            .is_none()
            .cmp(&b.region.is_none())
            .then_with(|| a.region.cmp(&b.region))
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Amount,
        model::{CustomerRecord, OrderRecord},
    };

    fn row(order_id: i64, region: Option<Option<&str>>, units: i64) -> EnrichedOrder {
        EnrichedOrder {
            order: OrderRecord {
                order_id,
                mobile_number: format!("555-{order_id}"),
                order_date_time: None,
                order_date_time_raw: String::new(),
                sku_id: String::new(),
                sku_count: 1,
                total_amount: Amount::Valid(Decimal::from(units)),
            },
            customer: region.map(|region| CustomerRecord {
                customer_id: order_id,
                customer_name: format!("Customer {order_id}"),
                mobile_number: format!("555-{order_id}"),
                region: region.map(str::to_string),
            }),
        }
    }

    #[test]
    fn sums_per_region_with_absent_bucket_last() {
        let view = vec![
            row(1, Some(Some("West")), 10),
            row(2, None, 4),
            row(3, Some(Some("East")), 3),
            row(4, Some(Some("West")), 5),
            row(5, Some(None), 1),
        ];
        let rows = regional_revenue(&view).expect("regional revenue");
        assert_eq!(
            rows,
            vec![
                RegionalRevenue {
                    region: Some("East".to_string()),
                    revenue: Decimal::from(3),
                },
                RegionalRevenue {
                    region: Some("West".to_string()),
                    revenue: Decimal::from(15),
                },
                RegionalRevenue {
                    region: None,
                    revenue: Decimal::from(5),
                },
            ]
        );
    }

    #[test]
    fn regional_totals_cover_all_revenue() {
        let view = vec![row(1, Some(Some("West")), 10), row(2, None, 4)];
        let total: Decimal = regional_revenue(&view)
            .expect("regional revenue")
            .iter()
            .map(|r| r.revenue)
            .sum();
        assert_eq!(total, Decimal::from(14));
    }

    #[test]
    fn invalid_amount_fails_the_kpi() {
        let mut bad = row(9, Some(Some("West")), 0);
        bad.order.total_amount = Amount::Invalid("".to_string());
        assert!(matches!(
            regional_revenue(&[bad]),
            Err(KpiError::InvalidAmount { order_id: 9, .. })
        ));
    }
}
