// ==========================================
// 商品目录导入与客户下单测试
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod catalog_order_test {
    use crate::test_helpers::{create_test_state, seed_products, NO_REPLENISH};
    use delivery_planner::engine::events::PoolEventType;
    use delivery_planner::importer::ImportError;
    use delivery_planner::{ApiError, OrderRequestItem, ShipmentStatus, SolveMethod};
    use std::io::Write;
    use tempfile::Builder;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_imported_catalog_is_orderable_and_plannable() {
        let (_tmp, state, publisher) = create_test_state(&NO_REPLENISH);
        let csv = write_csv(
            "name,weight,value,description\n\
             kettle,4,40,steel\n\
             lamp,3,50,\n\
             broken,0,10,zero weight\n",
        );

        let result = state.catalog_importer.import_from_csv(csv.path()).unwrap();
        assert_eq!(result.total_rows, 3);
        assert_eq!(result.imported, 2);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].line, 4);

        let version_before = state.pool_state.current_version();
        let placed = state
            .order_api
            .place_orders(
                7,
                &[
                    OrderRequestItem { product_id: 1, quantity: 2 },
                    OrderRequestItem { product_id: 2, quantity: 1 },
                ],
            )
            .unwrap();
        assert_eq!(placed.order_ids.len(), 3);
        assert!(placed.pool_version > version_before);
        assert_eq!(publisher.count(PoolEventType::OrdersPlaced), 1);

        let order = state.order_api.get_order(placed.order_ids[0]).unwrap();
        assert_eq!(order.user_id, 7);
        assert_eq!(order.weight, 4);
        assert_eq!(order.value, 40);
        assert_eq!(order.status, ShipmentStatus::Eligible);

        // 4 + 3 <= 8: 一件 kettle + lamp
        let plan = state.delivery_api.generate_delivery_plan("R1", 8).unwrap();
        assert_eq!(plan.method, SolveMethod::Exact);
        assert_eq!(plan.plan.total_value, 90);
        assert_eq!(plan.plan.orders.len(), 2);
    }

    #[test]
    fn test_import_missing_column_is_fatal() {
        let (_tmp, state, _publisher) = create_test_state(&NO_REPLENISH);
        let csv = write_csv("name,value\nkettle,40\n");

        let result = state.catalog_importer.import_from_csv(csv.path());
        assert!(matches!(result, Err(ImportError::MissingColumn(_))));
    }

    #[test]
    fn test_place_orders_validation() {
        let (_tmp, state, _publisher) = create_test_state(&NO_REPLENISH);
        let ids = seed_products(&state, &[("kettle", 4, 40)]);

        let bad_user = state
            .order_api
            .place_orders(0, &[OrderRequestItem { product_id: ids[0], quantity: 1 }]);
        assert!(matches!(bad_user, Err(ApiError::InvalidInput(_))));

        let no_items = state.order_api.place_orders(1, &[]);
        assert!(matches!(no_items, Err(ApiError::InvalidInput(_))));

        let zero_qty = state
            .order_api
            .place_orders(1, &[OrderRequestItem { product_id: ids[0], quantity: 0 }]);
        assert!(matches!(zero_qty, Err(ApiError::InvalidInput(_))));

        // 未知商品: 整单回滚
        let unknown = state.order_api.place_orders(
            1,
            &[
                OrderRequestItem { product_id: ids[0], quantity: 1 },
                OrderRequestItem { product_id: 404, quantity: 1 },
            ],
        );
        assert!(matches!(unknown, Err(ApiError::NotFound(_))));
        assert!(state.order_api.list_eligible_orders().unwrap().is_empty());

        let missing = state.order_api.get_order(12345);
        assert!(matches!(missing, Err(ApiError::NotFound(_))));
    }
}
