mod common;

use common::{listing, subscription, FakeContractsApi};
use contracts::contracts::{
    submit_purchase, Period, PurchaseOrder, RequestedProduct, SubscriptionStatus,
};
use contracts::ReconcileError;

fn requested(listing_id: &str, quantity: u64) -> RequestedProduct {
    RequestedProduct {
        product_listing_id: listing_id.to_string(),
        quantity,
    }
}

fn order(period: Period, products: Vec<RequestedProduct>) -> PurchaseOrder {
    PurchaseOrder {
        account_id: "a1".to_string(),
        previous_purchase_id: "p-month".to_string(),
        period,
        products,
        guest: false,
    }
}

fn subscribed() -> FakeContractsApi {
    let mut api = FakeContractsApi::default();
    api.subscriptions.insert(
        "a1".to_string(),
        vec![
            subscription(
                "s-month",
                Period::Monthly,
                SubscriptionStatus::Active,
                "p-month",
                vec![listing("l-ess", "essential", 2500, 2)],
            ),
            subscription(
                "s-year",
                Period::Yearly,
                SubscriptionStatus::Active,
                "p-year",
                vec![listing("l-ess", "essential", 22500, 10)],
            ),
        ],
    );
    api
}

#[tokio::test]
async fn requested_quantities_are_added_to_matching_period() {
    let api = subscribed();
    let order = order(
        Period::Monthly,
        vec![requested("l-ess", 3), requested("l-adv", 1)],
    );

    let purchase = submit_purchase(&api, "canonical-ua", &order, false)
        .await
        .unwrap();
    assert_eq!(purchase.id, "pNEW");

    let submitted = api.submitted();
    let (request, preview) = &submitted[0];
    assert!(!preview);
    assert_eq!(request.account_id, "a1");
    assert_eq!(request.previous_purchase_id, "p-month");
    let values: Vec<(&str, u64)> = request
        .items
        .iter()
        .map(|item| (item.product_listing_id.as_str(), item.value))
        .collect();
    assert_eq!(values, vec![("l-ess", 5), ("l-adv", 1)]);
    assert!(request
        .items
        .iter()
        .all(|item| item.metric == "active-machines" && !item.delete));
}

#[tokio::test]
async fn yearly_order_uses_yearly_quantities() {
    let api = subscribed();
    let order = order(Period::Yearly, vec![requested("l-ess", 1)]);

    submit_purchase(&api, "canonical-ua", &order, false)
        .await
        .unwrap();

    assert_eq!(api.submitted()[0].0.items[0].value, 11);
}

#[tokio::test]
async fn preview_is_forwarded() {
    let api = subscribed();
    let order = order(Period::Monthly, vec![requested("l-ess", 1)]);

    submit_purchase(&api, "canonical-ua", &order, true)
        .await
        .unwrap();

    assert!(api.submitted()[0].1);
    assert!(api.calls().contains(&"submit-preview".to_string()));
}

#[tokio::test]
async fn guest_order_skips_subscription_lookup() {
    let api = subscribed();
    let mut order = order(Period::Monthly, vec![requested("l-ess", 4)]);
    order.guest = true;

    submit_purchase(&api, "canonical-ua", &order, false)
        .await
        .unwrap();

    assert_eq!(api.submitted()[0].0.items[0].value, 4);
    assert_eq!(api.calls(), vec!["submit".to_string()]);
}

#[tokio::test]
async fn rejected_purchase_is_returned() {
    let mut api = subscribed();
    api.fail("submit", || ReconcileError::RemoteFailure {
        status: Some(400),
        body: "invalid listing".to_string(),
    });
    let order = order(Period::Monthly, vec![requested("l-ess", 1)]);

    let err = submit_purchase(&api, "canonical-ua", &order, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::RemoteFailure {
            status: Some(400),
            ..
        }
    ));
}

#[tokio::test]
async fn empty_order_is_invalid() {
    let api = subscribed();
    let order = order(Period::Monthly, Vec::new());

    let err = submit_purchase(&api, "canonical-ua", &order, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidRequest(_)));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn overflowing_target_quantity_is_rejected_before_submit() {
    let mut api = FakeContractsApi::default();
    api.subscriptions.insert(
        "a1".to_string(),
        vec![subscription(
            "s-month",
            Period::Monthly,
            SubscriptionStatus::Active,
            "p-month",
            vec![listing("l-ess", "essential", 2500, u64::MAX)],
        )],
    );
    let order = order(Period::Monthly, vec![requested("l-ess", 1)]);

    let err = submit_purchase(&api, "canonical-ua", &order, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidRequest(_)));
    assert!(api.submitted().is_empty());
}
