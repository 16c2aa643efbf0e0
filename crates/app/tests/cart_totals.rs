use proptest::prelude::*;

use storefront_app::{ProductDraft, Storefront};
use storefront_auth::{AppRole, Principal};
use storefront_catalog::ProductId;
use storefront_core::{Discount, Money, UserId};

#[derive(Debug, Clone)]
enum Step {
    Add { product: usize, quantity: u32 },
    Change { product: usize, delta: i64 },
    Remove { product: usize },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..4, 1u32..5).prop_map(|(product, quantity)| Step::Add { product, quantity }),
        (0usize..4, -4i64..4).prop_map(|(product, delta)| Step::Change { product, delta }),
        (0usize..4).prop_map(|product| Step::Remove { product }),
    ]
}

fn stocked_shop(prices: &[(u64, u16)]) -> (Storefront, Vec<ProductId>) {
    let app = Storefront::default();
    app.bootstrap().unwrap();
    let admin = Principal::new(UserId::new(), [AppRole::Admin.role()]);
    let category = app.create_category(&admin, "Garden").unwrap().id_typed();

    let products = prices
        .iter()
        .enumerate()
        .map(|(i, (price, discount))| {
            app.add_product(
                &admin,
                category,
                ProductDraft {
                    name: format!("Item {i}"),
                    description: "Garden supplies".into(),
                    image: None,
                    price: Money::from_minor(*price),
                    discount: Discount::from_percent(*discount).unwrap(),
                    stock: 1_000,
                },
            )
            .unwrap()
            .id_typed()
        })
        .collect();
    (app, products)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        ..ProptestConfig::default()
    })]

    /// Whatever sequence of cart edits succeeds or fails, the read model total
    /// always equals the sum of its line subtotals and the aggregate's total.
    #[test]
    fn read_model_total_tracks_lines(
        prices in prop::collection::vec((1u64..100_000, 0u16..=100), 4),
        steps in prop::collection::vec(step(), 1..20),
    ) {
        let (app, products) = stocked_shop(&prices);
        let shopper = Principal::new(UserId::new(), [AppRole::User.role()]);

        for step in steps {
            let outcome = match step {
                Step::Add { product, quantity } => app.add_to_my_cart(&shopper, products[product], quantity),
                Step::Change { product, delta } => app.change_my_quantity(&shopper, products[product], delta),
                Step::Remove { product } => app.remove_from_my_cart(&shopper, products[product]),
            };

            let Ok(cart) = outcome else { continue };
            let view = app.my_cart(&shopper).unwrap();
            let summed: Money = view.lines.iter().map(|l| l.subtotal()).sum();
            prop_assert_eq!(view.total(), summed);
            prop_assert_eq!(view.total(), cart.total());
            prop_assert!(view.lines.iter().all(|l| l.quantity > 0));
        }
    }
}
