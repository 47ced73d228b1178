//! Integration tests for the full posting pipeline.
//!
//! Service call -> locks -> aggregate + ledger planning -> atomic commit ->
//! audit publication, all against the in-memory store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use stockwise_auth::{Actor, catalog};
    use stockwise_core::{
        Currency, Incoterm, MAX_QUANTITY, MAX_UNIT_PRICE, PaymentMethod, PaymentTerm, TermsPatch, UnitOfMeasure, UserId,
    };
    use stockwise_events::EventBus;
    use stockwise_inventory::{LocationId, MovementAction, NewLocation};
    use stockwise_materials::{BomLine, CostSource, MaterialCategory, MaterialId, NewBom, NewMaterial};
    use stockwise_parties::{CompanyId, NewCompany};
    use stockwise_purchasing::{DemandStatus, NewDemand, ProcurementOrderId, ProcurementStatus};
    use stockwise_sales::{SalesOrderId, SalesStatus};

    use crate::config::StockwiseConfig;
    use crate::error::ServiceError;
    use crate::locks::LockKey;
    use crate::rates::{InMemoryRates, RateError, RateService};
    use crate::services::InMemoryStockwise;
    use crate::store::LedgerStore;

    /// Counts every call that reaches the rate table.
    struct CountingRates {
        inner: Arc<InMemoryRates>,
        calls: Arc<AtomicUsize>,
    }

    impl RateService for CountingRates {
        fn get_rate(&self, from: Currency, to: Currency, date: NaiveDate) -> Result<Option<Decimal>, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_rate(from, to, date)
        }

        fn latest_rate(&self, from: Currency, to: Currency) -> Result<Option<(NaiveDate, Decimal)>, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.latest_rate(from, to)
        }
    }

    struct Fixture {
        app: InMemoryStockwise,
        rates: Arc<InMemoryRates>,
        rate_calls: Arc<AtomicUsize>,
        admin: Actor,
        vendor: CompanyId,
        customer: CompanyId,
        material: MaterialId,
        shelf: LocationId,
        other_shelf: LocationId,
    }

    fn setup_with(lock_timeout_ms: u64) -> Fixture {
        stockwise_observability::init_with_filter(&StockwiseConfig::default().log_filter);
        let rates = Arc::new(InMemoryRates::new());
        let config = StockwiseConfig {
            lock_timeout_ms,
            rate_lookup_timeout_ms: 500,
            ..StockwiseConfig::default()
        };
        let rate_calls = Arc::new(AtomicUsize::new(0));
        let counting = CountingRates {
            inner: rates.clone(),
            calls: rate_calls.clone(),
        };
        let app = InMemoryStockwise::in_memory(config, Arc::new(counting));
        let admin = Actor::superuser(UserId::new());

        let company = |name: &str| {
            app.register_company(
                &admin,
                NewCompany {
                    name: name.to_string(),
                    legal_name: format!("{name} Ltd."),
                    ..NewCompany::default()
                },
            )
            .unwrap()
            .id_typed()
        };
        let vendor = company("Polymer Supply");
        let customer = company("Packaging Buyer");

        let material = app
            .register_material(
                &admin,
                NewMaterial {
                    name: "PP granule".to_string(),
                    category: MaterialCategory::Supplied,
                    description: String::new(),
                },
            )
            .unwrap()
            .id_typed();

        let shelf = |bin: i32| {
            app.create_location(
                &admin,
                NewLocation {
                    area: Some(1),
                    section: Some(1),
                    shelf: Some(0),
                    bin: Some(bin),
                    ..NewLocation::default()
                },
            )
            .unwrap()
            .id_typed()
        };
        let first = shelf(1);
        let second = shelf(2);

        Fixture {
            app,
            rates,
            rate_calls,
            admin,
            vendor,
            customer,
            material,
            shelf: first,
            other_shelf: second,
        }
    }

    fn setup() -> Fixture {
        setup_with(200)
    }

    fn terms(currency: Currency) -> TermsPatch {
        TermsPatch {
            payment_term: Some(PaymentTerm::NetT),
            payment_method: Some(PaymentMethod::BankTransfer),
            incoterms: Some(Incoterm::Exw),
            due_in_days: Some(30),
            description: Some("granules for line 3".to_string()),
            currency: Some(currency),
            delivery_address: Some("Esenyurt".to_string()),
            ..TermsPatch::default()
        }
    }

    fn draft_po(fx: &Fixture, currency: Currency, lines: &[(Decimal, Decimal)]) -> (ProcurementOrderId, Vec<u32>) {
        let order = fx
            .app
            .create_procurement_order(&fx.admin, Some(fx.vendor), terms(currency))
            .unwrap();
        let id = order.id_typed();
        let line_nos = lines
            .iter()
            .map(|(qty, price)| {
                fx.app
                    .add_procurement_line(&fx.admin, id, fx.material, UnitOfMeasure::Piece, *qty, Some(*price), dec!(0.2))
                    .unwrap()
            })
            .collect();
        (id, line_nos)
    }

    fn advance_po(fx: &Fixture, id: ProcurementOrderId, path: &[ProcurementStatus]) {
        for to in path {
            fx.app
                .change_procurement_status(&fx.admin, id, *to, None, "workflow")
                .unwrap();
        }
    }

    fn ordered_po(fx: &Fixture, lines: &[(Decimal, Decimal)]) -> (ProcurementOrderId, Vec<u32>) {
        let (id, line_nos) = draft_po(fx, Currency::Try, lines);
        advance_po(
            fx,
            id,
            &[ProcurementStatus::Submitted, ProcurementStatus::Approved, ProcurementStatus::Ordered],
        );
        (id, line_nos)
    }

    fn approved_so(fx: &Fixture, quantity: Decimal) -> (SalesOrderId, u32) {
        let id = fx
            .app
            .create_sales_order(&fx.admin, Some(fx.customer), terms(Currency::Try))
            .unwrap()
            .id_typed();
        let line_no = fx
            .app
            .add_sales_line(&fx.admin, id, fx.material, UnitOfMeasure::Piece, quantity, Some(dec!(300)), dec!(0.2))
            .unwrap();
        for to in [SalesStatus::Submitted, SalesStatus::Approved] {
            fx.app
                .change_sales_status(&fx.admin, id, to, None, None, "workflow")
                .unwrap();
        }
        (id, line_no)
    }

    fn receive(fx: &Fixture, id: ProcurementOrderId, line_no: u32, qty: Decimal) {
        fx.app
            .enter_from_procurement_line(&fx.admin, id, line_no, fx.shelf, qty, "goods in")
            .unwrap();
    }

    fn available(fx: &Fixture, location: LocationId) -> Decimal {
        fx.app
            .stock_position(fx.material, UnitOfMeasure::Piece, location)
            .unwrap()
            .available
    }

    #[test]
    fn receipts_average_to_150() {
        let fx = setup();
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100)), (dec!(10), dec!(200))]);

        receive(&fx, po, lines[0], dec!(10));
        receive(&fx, po, lines[1], dec!(10));

        assert_eq!(
            fx.app.weighted_average_cost(fx.material, UnitOfMeasure::Piece, fx.shelf).unwrap(),
            dec!(150)
        );
        assert_eq!(available(&fx, fx.shelf), dec!(20));
        assert_eq!(fx.app.balance(fx.material, UnitOfMeasure::Piece).unwrap(), dec!(20));

        let order = fx.app.procurement_order(po).unwrap();
        assert!(order.all_received());
        assert_eq!(order.line(lines[0]).unwrap().quantity_received, dec!(10));
    }

    #[test]
    fn oversized_lines_are_refused_and_largest_lines_value_cleanly() {
        let fx = setup();
        let order = fx
            .app
            .create_procurement_order(&fx.admin, Some(fx.vendor), terms(Currency::Try))
            .unwrap()
            .id_typed();
        let huge = dec!(1000000000000000);
        let err = fx
            .app
            .add_procurement_line(&fx.admin, order, fx.material, UnitOfMeasure::Piece, huge, Some(huge), dec!(0.2))
            .unwrap_err();
        match err {
            ServiceError::Validation(e) if e.has_field("quantity") => {}
            other => panic!("Expected Validation on quantity, got {other:?}"),
        }
        let err = fx
            .app
            .add_procurement_line(&fx.admin, order, fx.material, UnitOfMeasure::Piece, dec!(10), Some(huge), dec!(0.2))
            .unwrap_err();
        match err {
            ServiceError::Validation(e) if e.has_field("unit_price") => {}
            other => panic!("Expected Validation on unit_price, got {other:?}"),
        }

        let largest = MAX_QUANTITY.trunc();
        let (po, lines) = ordered_po(&fx, &[(largest, MAX_UNIT_PRICE), (largest, MAX_UNIT_PRICE)]);
        receive(&fx, po, lines[0], largest);
        receive(&fx, po, lines[1], largest);

        let position = fx
            .app
            .stock_position(fx.material, UnitOfMeasure::Piece, fx.shelf)
            .unwrap();
        assert_eq!(position.available, largest * dec!(2));
        assert_eq!(position.average_cost, MAX_UNIT_PRICE);
        assert!(position.value().is_some());
    }

    #[test]
    fn partial_then_over_delivery() {
        let fx = setup();
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(5))]);

        receive(&fx, po, lines[0], dec!(4));
        assert!(!fx.app.procurement_order(po).unwrap().all_received());
        receive(&fx, po, lines[0], dec!(6));
        assert!(fx.app.procurement_order(po).unwrap().all_received());

        let err = fx
            .app
            .enter_from_procurement_line(&fx.admin, po, lines[0], fx.shelf, dec!(1), "extra")
            .unwrap_err();
        match err {
            ServiceError::Validation(e) if e.has_field("quantity") && e.to_string().contains("exceeds remaining") => {}
            other => panic!("Expected Validation on quantity, got {other:?}"),
        }
        assert_eq!(available(&fx, fx.shelf), dec!(10));
        assert_eq!(fx.app.procurement_order(po).unwrap().line(lines[0]).unwrap().quantity_received, dec!(10));
    }

    #[test]
    fn receipts_wait_for_the_order_to_be_placed() {
        let fx = setup();
        let (po, lines) = draft_po(&fx, Currency::Try, &[(dec!(10), dec!(5))]);
        advance_po(&fx, po, &[ProcurementStatus::Submitted, ProcurementStatus::Approved]);

        let err = fx
            .app
            .enter_from_procurement_line(&fx.admin, po, lines[0], fx.shelf, dec!(1), "early")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(fx.app.store().movements().unwrap().is_empty());
    }

    #[test]
    fn dispatch_prices_at_average_and_refuses_overdraw() {
        let fx = setup();
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100)), (dec!(10), dec!(200))]);
        receive(&fx, po, lines[0], dec!(10));
        receive(&fx, po, lines[1], dec!(10));
        let (so, line_no) = approved_so(&fx, dec!(30));

        let out = fx
            .app
            .exit_from_sales_line(&fx.admin, so, line_no, fx.shelf, dec!(12), "truck 7")
            .unwrap();
        assert_eq!(out.action(), MovementAction::Out);
        assert_eq!(out.quantity(), dec!(-12));
        assert_eq!(out.unit_cost(), dec!(150));
        assert_eq!(available(&fx, fx.shelf), dec!(8));

        let err = fx
            .app
            .exit_from_sales_line(&fx.admin, so, line_no, fx.shelf, dec!(9), "truck 8")
            .unwrap_err();
        match err {
            ServiceError::Validation(e) if e.has_field("quantity") => {}
            other => panic!("Expected Validation on quantity, got {other:?}"),
        }
        assert_eq!(fx.app.sales_order(so).unwrap().line(line_no).unwrap().quantity_sent, dec!(12));
    }

    #[test]
    fn dispatch_from_an_empty_location_names_the_location() {
        let fx = setup();
        let (so, line_no) = approved_so(&fx, dec!(1));
        match fx.app.exit_from_sales_line(&fx.admin, so, line_no, fx.other_shelf, dec!(1), "x") {
            Err(ServiceError::Validation(e)) if e.has_field("location") => {}
            other => panic!("Expected Validation on location, got {other:?}"),
        }
    }

    #[test]
    fn adjustment_sets_the_counted_quantity() {
        let fx = setup();
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100))]);
        receive(&fx, po, lines[0], dec!(10));

        let unchanged = fx
            .app
            .adjustment(&fx.admin, fx.shelf, fx.material, UnitOfMeasure::Piece, dec!(10), "count")
            .unwrap();
        assert!(unchanged.is_none());
        assert_eq!(fx.app.store().movements().unwrap().len(), 1);

        let down = fx
            .app
            .adjustment(&fx.admin, fx.shelf, fx.material, UnitOfMeasure::Piece, dec!(7), "count")
            .unwrap()
            .unwrap();
        assert_eq!(down.quantity(), dec!(-3));
        assert_eq!(down.unit_cost(), dec!(100));

        let up = fx
            .app
            .adjustment(&fx.admin, fx.shelf, fx.material, UnitOfMeasure::Piece, dec!(12), "found a box")
            .unwrap()
            .unwrap();
        assert_eq!(up.quantity(), dec!(5));
        assert_eq!(available(&fx, fx.shelf), dec!(12));
        assert_eq!(fx.app.balance(fx.material, UnitOfMeasure::Piece).unwrap(), dec!(12));

        let err = fx
            .app
            .adjustment(&fx.admin, fx.shelf, fx.material, UnitOfMeasure::Piece, dec!(2.5), "count")
            .unwrap_err();
        assert!(err.validation_errors().is_some_and(|e| e.has_field("new_quantity")));
    }

    #[test]
    fn transfer_conserves_totals() {
        let fx = setup();
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100))]);
        receive(&fx, po, lines[0], dec!(10));

        let (out, inbound) = fx
            .app
            .transfer(&fx.admin, fx.shelf, fx.other_shelf, fx.material, UnitOfMeasure::Piece, dec!(4), "restock")
            .unwrap();
        assert_eq!(out.quantity() + inbound.quantity(), dec!(0));
        assert_eq!(inbound.unit_cost(), dec!(100));
        assert_eq!(available(&fx, fx.shelf), dec!(6));
        assert_eq!(available(&fx, fx.other_shelf), dec!(4));
        assert_eq!(fx.app.balance(fx.material, UnitOfMeasure::Piece).unwrap(), dec!(10));

        match fx.app.transfer(&fx.admin, fx.shelf, fx.shelf, fx.material, UnitOfMeasure::Piece, dec!(1), "noop") {
            Err(ServiceError::Validation(e)) if e.has_field("to_location") => {}
            other => panic!("Expected Validation on to_location, got {other:?}"),
        }
        match fx.app.transfer(&fx.admin, fx.shelf, fx.other_shelf, fx.material, UnitOfMeasure::Piece, dec!(7), "too much") {
            Err(ServiceError::Validation(e)) if e.has_field("quantity") => {}
            other => panic!("Expected Validation on quantity, got {other:?}"),
        }
    }

    #[test]
    fn deleted_location_takes_no_postings() {
        let fx = setup();
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100))]);
        fx.app.soft_delete_location(&fx.admin, fx.shelf).unwrap();

        match fx.app.enter_from_procurement_line(&fx.admin, po, lines[0], fx.shelf, dec!(1), "x") {
            Err(ServiceError::NotFound(what)) if what.starts_with("location") => {}
            other => panic!("Expected NotFound, got {other:?}"),
        }

        fx.app.restore_location(&fx.admin, fx.shelf).unwrap();
        receive(&fx, po, lines[0], dec!(1));
    }

    #[test]
    fn location_addresses_are_unique_among_live_locations() {
        let fx = setup();
        let same = NewLocation {
            area: Some(1),
            section: Some(1),
            shelf: Some(0),
            bin: Some(1),
            ..NewLocation::default()
        };
        match fx.app.create_location(&fx.admin, same.clone()) {
            Err(ServiceError::Validation(e)) if e.has_field("address") => {}
            other => panic!("Expected Validation on address, got {other:?}"),
        }

        fx.app.soft_delete_location(&fx.admin, fx.shelf).unwrap();
        let replacement = fx.app.create_location(&fx.admin, same).unwrap();
        assert_eq!(replacement.name(), "A1-Z-P1");
        assert!(fx.app.restore_location(&fx.admin, fx.shelf).is_err());
    }

    #[test]
    fn reconciliation_reports_and_repairs_drift() {
        let fx = setup();
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100))]);
        receive(&fx, po, lines[0], dec!(10));
        assert!(fx.app.reconcile_balances().unwrap().is_empty());

        fx.app
            .store()
            .overwrite_balance(fx.material, UnitOfMeasure::Piece, dec!(13))
            .unwrap();
        let drifts = fx.app.reconcile_balances().unwrap();
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].cached, dec!(13));
        assert_eq!(drifts[0].replayed, dec!(10));

        fx.app.rebuild_balances().unwrap();
        assert!(fx.app.reconcile_balances().unwrap().is_empty());
    }

    #[test]
    fn postings_need_the_transact_permission() {
        let fx = setup();
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100))]);
        let clerk = Actor::new(UserId::new(), [catalog::PROCUREMENT_SUBMIT]);

        match fx.app.enter_from_procurement_line(&clerk, po, lines[0], fx.shelf, dec!(1), "x") {
            Err(ServiceError::Unauthorized(p)) if p == "inventory.transact" => {}
            other => panic!("Expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn transitions_need_their_permission() {
        let fx = setup();
        let (po, _) = draft_po(&fx, Currency::Try, &[(dec!(1), dec!(1))]);
        let clerk = Actor::new(UserId::new(), [catalog::PROCUREMENT_SUBMIT]);

        fx.app
            .change_procurement_status(&clerk, po, ProcurementStatus::Submitted, None, "ready")
            .unwrap();
        match fx.app.change_procurement_status(&clerk, po, ProcurementStatus::Approved, None, "self-approve") {
            Err(ServiceError::Unauthorized(p)) if p == "procurement.approve" => {}
            other => panic!("Expected Unauthorized, got {other:?}"),
        }
        fx.app
            .change_procurement_status(&clerk, po, ProcurementStatus::Draft, None, "rework")
            .unwrap();
        assert_eq!(
            fx.app.procurement_transitions(po).unwrap(),
            &[ProcurementStatus::Submitted]
        );
    }

    #[test]
    fn empty_orders_cannot_be_submitted() {
        let fx = setup();
        let (po, _) = draft_po(&fx, Currency::Try, &[]);
        match fx.app.change_procurement_status(&fx.admin, po, ProcurementStatus::Submitted, None, "go") {
            Err(ServiceError::Validation(e)) if e.has_field("lines") => {}
            other => panic!("Expected Validation on lines, got {other:?}"),
        }
        assert_eq!(fx.app.procurement_order(po).unwrap().status(), ProcurementStatus::Draft);
    }

    #[test]
    fn order_numbers_are_assigned_once() {
        let fx = setup();
        let (first, _) = draft_po(&fx, Currency::Try, &[]);
        let (second, _) = draft_po(&fx, Currency::Try, &[]);
        let a = fx.app.procurement_order(first).unwrap();
        let b = fx.app.procurement_order(second).unwrap();
        let (a, b) = (a.number().unwrap(), b.number().unwrap());
        assert_eq!(a.len(), 16);
        assert!(a.starts_with("PO-#"));
        assert!(a.ends_with('1'));
        assert!(b.ends_with('2'));
    }

    #[test]
    fn approval_records_converted_cost_once() {
        let fx = setup();
        let today = Utc::now().date_naive();
        fx.rates.set_rate(Currency::Usd, Currency::Try, today, dec!(30));
        let (po, _) = draft_po(&fx, Currency::Usd, &[(dec!(10), dec!(2)), (dec!(5), dec!(3))]);

        advance_po(&fx, po, &[ProcurementStatus::Submitted, ProcurementStatus::Approved]);
        let costs = fx.app.costs_of(fx.material).unwrap();
        assert_eq!(costs.len(), 1);
        assert_eq!(costs[0].cost, dec!(60));
        assert_eq!(costs[0].currency, Currency::Try);
        assert_eq!(costs[0].source, CostSource::ProcurementOrder { order_id: po.0 });

        advance_po(
            &fx,
            po,
            &[
                ProcurementStatus::Rejected,
                ProcurementStatus::Draft,
                ProcurementStatus::Submitted,
                ProcurementStatus::Approved,
            ],
        );
        assert_eq!(fx.app.costs_of(fx.material).unwrap().len(), 1);
    }

    #[test]
    fn approval_looks_up_the_rate_once_for_all_lines() {
        let fx = setup();
        let today = Utc::now().date_naive();
        fx.rates.set_rate(Currency::Usd, Currency::Try, today, dec!(30));

        let order = fx
            .app
            .create_procurement_order(&fx.admin, Some(fx.vendor), terms(Currency::Usd))
            .unwrap()
            .id_typed();
        let mut materials = vec![fx.material];
        for name in ["PE granule", "Masterbatch", "UV additive"] {
            let material = fx
                .app
                .register_material(
                    &fx.admin,
                    NewMaterial {
                        name: name.to_string(),
                        category: MaterialCategory::Supplied,
                        description: String::new(),
                    },
                )
                .unwrap()
                .id_typed();
            materials.push(material);
        }
        for (i, material) in materials.iter().enumerate() {
            fx.app
                .add_procurement_line(
                    &fx.admin,
                    order,
                    *material,
                    UnitOfMeasure::Piece,
                    dec!(10),
                    Some(Decimal::from(i + 1)),
                    dec!(0.2),
                )
                .unwrap();
        }

        advance_po(&fx, order, &[ProcurementStatus::Submitted]);
        let before = fx.rate_calls.load(Ordering::SeqCst);
        advance_po(&fx, order, &[ProcurementStatus::Approved]);

        assert_eq!(fx.rate_calls.load(Ordering::SeqCst) - before, 1);
        for (i, material) in materials.iter().enumerate() {
            let cost = fx.app.latest_cost_for_uom(*material, UnitOfMeasure::Piece).unwrap().unwrap();
            assert_eq!(cost.cost, Decimal::from(30 * (i + 1)));
            assert_eq!(cost.currency, Currency::Try);
        }
    }

    #[test]
    fn approval_without_rates_flags_unconverted_cost() {
        let fx = setup();
        let audit = fx.app.bus().subscribe();
        let (po, _) = draft_po(&fx, Currency::Eur, &[(dec!(1), dec!(7.5))]);
        advance_po(&fx, po, &[ProcurementStatus::Submitted, ProcurementStatus::Approved]);

        let cost = fx.app.latest_cost_for_uom(fx.material, UnitOfMeasure::Piece).unwrap().unwrap();
        assert_eq!(cost.cost, dec!(7.5));
        assert_eq!(cost.currency, Currency::Eur);
        assert!(
            audit
                .drain()
                .iter()
                .any(|e| e.event_type() == "materials.cost.recorded_unconverted")
        );
    }

    #[test]
    fn audit_trail_carries_actor_and_reason() {
        let fx = setup();
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100))]);
        let audit = fx.app.bus().subscribe();
        receive(&fx, po, lines[0], dec!(2));

        let published = audit.drain();
        let types: Vec<&str> = published.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["purchasing.order.goods_received", "inventory.movement.posted"]);
        assert!(published.iter().all(|e| e.actor() == Some(fx.admin.user_id)));
        assert!(published.iter().all(|e| e.reason() == Some("goods in")));

        let stream = fx.app.store().load_stream(po.0).unwrap();
        assert_eq!(stream.last().unwrap().event_type(), "purchasing.order.goods_received");
    }

    #[test]
    fn held_order_lock_times_out_as_conflict() {
        let fx = setup_with(30);
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100))]);

        let _held = fx.app.locks().acquire([LockKey::Order(po.0)]).unwrap();
        let err = fx
            .app
            .enter_from_procurement_line(&fx.admin, po, lines[0], fx.shelf, dec!(1), "x")
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(fx.app.store().movements().unwrap().is_empty());
    }

    #[test]
    fn concurrent_dispatches_never_overdraw() {
        let fx = setup_with(5_000);
        let (po, lines) = ordered_po(&fx, &[(dec!(20), dec!(100))]);
        receive(&fx, po, lines[0], dec!(20));
        let (so, line_no) = approved_so(&fx, dec!(100));

        let fx = Arc::new(fx);
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let fx = Arc::clone(&fx);
                thread::spawn(move || {
                    fx.app
                        .exit_from_sales_line(&fx.admin, so, line_no, fx.shelf, dec!(3), "picker")
                        .is_ok()
                })
            })
            .collect();
        let shipped = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

        assert_eq!(shipped, 6);
        assert_eq!(available(&fx, fx.shelf), dec!(2));
        assert_eq!(fx.app.sales_order(so).unwrap().line(line_no).unwrap().quantity_sent, dec!(18));
        assert!(fx.app.reconcile_balances().unwrap().is_empty());
    }

    #[test]
    fn concurrent_receipts_never_over_receive() {
        let fx = setup_with(5_000);
        let (po, lines) = ordered_po(&fx, &[(dec!(10), dec!(100))]);

        let fx = Arc::new(fx);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fx = Arc::clone(&fx);
                let line_id = lines[0];
                thread::spawn(move || {
                    fx.app
                        .enter_from_procurement_line(&fx.admin, po, line_id, fx.shelf, dec!(3), "goods in")
                        .is_ok()
                })
            })
            .collect();
        let received = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

        assert_eq!(received, 3);
        let line = fx.app.procurement_order(po).unwrap().line(lines[0]).unwrap().clone();
        assert_eq!(line.quantity_received, dec!(9));
        assert!(line.quantity_received >= Decimal::ZERO && line.quantity_received <= line.quantity);
        assert_eq!(available(&fx, fx.shelf), dec!(9));
        assert!(fx.app.reconcile_balances().unwrap().is_empty());
    }

    #[test]
    fn opposite_transfers_do_not_deadlock() {
        let fx = setup_with(5_000);
        let (po, lines) = ordered_po(&fx, &[(dec!(20), dec!(100))]);
        receive(&fx, po, lines[0], dec!(20));
        fx.app
            .transfer(&fx.admin, fx.shelf, fx.other_shelf, fx.material, UnitOfMeasure::Piece, dec!(10), "split")
            .unwrap();

        let fx = Arc::new(fx);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let fx = Arc::clone(&fx);
                thread::spawn(move || {
                    let (from, to) = if i % 2 == 0 {
                        (fx.shelf, fx.other_shelf)
                    } else {
                        (fx.other_shelf, fx.shelf)
                    };
                    fx.app
                        .transfer(&fx.admin, from, to, fx.material, UnitOfMeasure::Piece, dec!(1), "shuffle")
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(available(&fx, fx.shelf) + available(&fx, fx.other_shelf), dec!(20));
        assert_eq!(fx.app.balance(fx.material, UnitOfMeasure::Piece).unwrap(), dec!(20));
    }

    #[test]
    fn sales_billing_needs_invoice_details() {
        let fx = setup();
        let (so, _) = approved_so(&fx, dec!(1));

        match fx.app.change_sales_status(&fx.admin, so, SalesStatus::Billed, None, None, "bill") {
            Err(ServiceError::Validation(e)) if e.has_field("invoice_date") && e.has_field("invoice_number") => {}
            other => panic!("Expected Validation, got {other:?}"),
        }

        let invoice_date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let order = fx
            .app
            .change_sales_status(&fx.admin, so, SalesStatus::Billed, Some(invoice_date), Some("INV-1".to_string()), "bill")
            .unwrap();
        assert_eq!(order.invoice_number(), Some("INV-1"));
        assert_eq!(order.last_payment_date(), NaiveDate::from_ymd_opt(2025, 2, 9));
    }

    #[test]
    fn dispatch_flag_needs_its_permission() {
        let fx = setup();
        let (so, _) = approved_so(&fx, dec!(1));
        let seller = Actor::new(UserId::new(), [catalog::SALES_APPROVE]);

        assert!(matches!(
            fx.app.set_dispatch_ordered(&seller, so, true, "ship it"),
            Err(ServiceError::Unauthorized(_))
        ));
        let order = fx.app.set_dispatch_ordered(&fx.admin, so, true, "ship it").unwrap();
        assert!(order.dispatch_ordered());
    }

    #[test]
    fn soft_deleted_orders_are_hidden_until_restored() {
        let fx = setup();
        let (so, _) = approved_so(&fx, dec!(1));
        fx.app.soft_delete_sales_order(&fx.admin, so, "duplicate").unwrap();
        assert!(matches!(fx.app.sales_order(so), Err(ServiceError::NotFound(_))));
        fx.app.restore_sales_order(&fx.admin, so, "not a duplicate").unwrap();
        assert_eq!(fx.app.sales_order(so).unwrap().status(), SalesStatus::Approved);
    }

    #[test]
    fn bom_definition_records_rolled_up_cost() {
        let fx = setup();
        let component = fx.material;
        fx.app
            .record_manual_cost(&fx.admin, component, dec!(2.5), Currency::Try, UnitOfMeasure::Kilogram, "quote")
            .unwrap();
        let product = fx
            .app
            .register_material(
                &fx.admin,
                NewMaterial {
                    name: "Crate".to_string(),
                    category: MaterialCategory::Good,
                    description: String::new(),
                },
            )
            .unwrap();
        assert!(product.internal_code().unwrap().starts_with("SAT-"));

        let bom = fx
            .app
            .define_bom(
                &fx.admin,
                NewBom {
                    product: product.id_typed(),
                    uom: UnitOfMeasure::Piece,
                    labor_cost: dec!(1),
                    machining_cost: dec!(0.5),
                    lines: vec![BomLine {
                        component,
                        quantity: dec!(2),
                        uom: UnitOfMeasure::Kilogram,
                    }],
                },
            )
            .unwrap();

        let cost = fx
            .app
            .latest_cost_for_uom(product.id_typed(), UnitOfMeasure::Piece)
            .unwrap()
            .unwrap();
        assert_eq!(cost.cost, dec!(6.5));
        assert_eq!(cost.source, CostSource::BillOfMaterials { bom_id: bom.id_typed() });

        let cyclic = fx.app.define_bom(
            &fx.admin,
            NewBom {
                product: component,
                uom: UnitOfMeasure::Kilogram,
                labor_cost: dec!(0),
                machining_cost: dec!(0),
                lines: vec![BomLine {
                    component: product.id_typed(),
                    quantity: dec!(1),
                    uom: UnitOfMeasure::Piece,
                }],
            },
        );
        assert!(matches!(cyclic, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn demands_are_numbered_and_advance_one_step() {
        let fx = setup();
        let demand = fx
            .app
            .submit_demand(
                &fx.admin,
                NewDemand {
                    material: fx.material,
                    quantity: dec!(40),
                    uom: UnitOfMeasure::Piece,
                    deadline: None,
                    description: "line 3 refill".to_string(),
                },
            )
            .unwrap();
        assert_eq!(demand.number().unwrap().len(), 14);

        assert!(fx.app.advance_demand(&fx.admin, demand.id_typed(), DemandStatus::Closed).is_err());
        let approved = fx
            .app
            .advance_demand(&fx.admin, demand.id_typed(), DemandStatus::Approved)
            .unwrap();
        assert_eq!(approved.status(), DemandStatus::Approved);
    }

    #[test]
    fn legal_names_are_unique() {
        let fx = setup();
        let dup = fx.app.register_company(
            &fx.admin,
            NewCompany {
                name: "Other".to_string(),
                legal_name: "polymer supply ltd.".to_string(),
                ..NewCompany::default()
            },
        );
        match dup {
            Err(ServiceError::Validation(e)) if e.has_field("legal_name") => {}
            other => panic!("Expected Validation on legal_name, got {other:?}"),
        }
    }
}
