use std::thread;

use storefront_app::{AppError, ErrorKind, ProductDraft, Storefront};
use storefront_auth::{AppRole, Principal};
use storefront_catalog::{CategoryId, ProductId};
use storefront_core::{Discount, Money, UserId};
use storefront_orders::{AddressDetails, AddressId, Order, Payment};

const ROUNDS: usize = 16;

fn principal(role: AppRole) -> Principal {
    Principal::new(UserId::new(), [role.role()])
}

fn shop() -> anyhow::Result<(Storefront, Principal, CategoryId)> {
    let app = Storefront::default();
    app.bootstrap()?;
    let admin = principal(AppRole::Admin);
    let category = app.create_category(&admin, "Electronics")?.id_typed();
    Ok((app, admin, category))
}

fn list(app: &Storefront, seller: &Principal, category: CategoryId, name: &str, stock: u32) -> anyhow::Result<ProductId> {
    let product = app.add_product(
        seller,
        category,
        ProductDraft {
            name: name.to_string(),
            description: format!("{name} for testing"),
            image: None,
            price: Money::from_major(100)?,
            discount: Discount::from_percent(10)?,
            stock,
        },
    )?;
    Ok(product.id_typed())
}

fn address_of(app: &Storefront, owner: &Principal) -> anyhow::Result<AddressId> {
    let address = app.create_address(
        owner,
        AddressDetails {
            street: "Baker Street".into(),
            building_name: "Building 221B".into(),
            city: "London".into(),
            state: "England".into(),
            country: "UK".into(),
            pincode: "NW16XE".into(),
        },
    )?;
    Ok(address.id_typed())
}

fn card_payment() -> Payment {
    Payment {
        method: "card".into(),
        gateway_name: "stripe".into(),
        gateway_payment_id: "pi_123".into(),
        gateway_status: "succeeded".into(),
        gateway_response_message: "Payment successful".into(),
    }
}

#[test]
fn one_cart_places_at_most_one_order() -> anyhow::Result<()> {
    for _ in 0..ROUNDS {
        let (app, admin, category) = shop()?;
        let shopper = principal(AppRole::User);
        let phone = list(&app, &admin, category, "Phone", 10)?;
        let address = address_of(&app, &shopper)?;
        app.add_to_my_cart(&shopper, phone, 2)?;

        let outcomes: Vec<Result<Order, AppError>> = thread::scope(|s| {
            let racers: Vec<_> = (0..2)
                .map(|_| {
                    let app = &app;
                    let shopper = &shopper;
                    s.spawn(move || app.place_order(shopper, address, card_payment()))
                })
                .collect();
            racers.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let placed = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(placed, 1, "{outcomes:?}");
        for outcome in &outcomes {
            if let Err(e) = outcome {
                assert!(
                    matches!(e.kind(), ErrorKind::Concurrency | ErrorKind::InvalidState),
                    "unexpected loser error: {e}"
                );
            }
        }

        assert_eq!(app.my_orders(&shopper)?.len(), 1);
        assert_eq!(app.product(phone)?.stock, 8);
        assert!(app.my_cart(&shopper)?.lines.is_empty());
    }
    Ok(())
}

#[test]
fn racing_first_adds_share_one_cart() -> anyhow::Result<()> {
    for _ in 0..ROUNDS {
        let (app, admin, category) = shop()?;
        let shopper = principal(AppRole::User);
        let products = (0..8)
            .map(|i| list(&app, &admin, category, &format!("Item {i}"), 5))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let outcomes: Vec<Result<(), AppError>> = thread::scope(|s| {
            let adders: Vec<_> = products
                .iter()
                .map(|&product| {
                    let app = &app;
                    let shopper = &shopper;
                    s.spawn(move || app.add_to_my_cart(shopper, product, 1).map(|_| ()))
                })
                .collect();
            adders.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for outcome in &outcomes {
            if let Err(e) = outcome {
                assert_eq!(e.kind(), ErrorKind::Concurrency, "unexpected add error: {e}");
            }
        }
        let added = outcomes.iter().filter(|o| o.is_ok()).count();
        assert!(added >= 1);

        let carts = app.all_carts(&admin)?;
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].owner, shopper.user_id);
        assert_eq!(app.my_cart(&shopper)?.lines.len(), added);
    }
    Ok(())
}

#[test]
fn a_placement_that_fails_after_checkout_gives_the_lines_back() -> anyhow::Result<()> {
    let (app, admin, category) = shop()?;
    let shopper = principal(AppRole::User);
    let phone = list(&app, &admin, category, "Phone", 5)?;
    let charger = list(&app, &admin, category, "Charger", 3)?;
    let address = address_of(&app, &shopper)?;
    app.add_to_my_cart(&shopper, phone, 2)?;
    app.add_to_my_cart(&shopper, charger, 3)?;
    let before = app.my_cart(&shopper)?;

    // Another shopper takes the chargers first.
    let rival = principal(AppRole::User);
    let rival_address = address_of(&app, &rival)?;
    app.add_to_my_cart(&rival, charger, 3)?;
    app.place_order(&rival, rival_address, card_payment())?;

    let err = app.place_order(&shopper, address, card_payment()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    assert_eq!(app.my_cart(&shopper)?, before);
    assert_eq!(app.product(phone)?.stock, 5);
    assert_eq!(app.product(charger)?.stock, 0);
    assert!(app.my_orders(&shopper)?.is_empty());

    // The restored cart orders fine without the sold-out line.
    app.remove_from_my_cart(&shopper, charger)?;
    let order = app.place_order(&shopper, address, card_payment())?;
    assert_eq!(order.lines().len(), 1);
    assert_eq!(app.product(phone)?.stock, 3);
    Ok(())
}
