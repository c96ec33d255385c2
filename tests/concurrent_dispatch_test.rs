// ==========================================
// 并发派发测试
// ==========================================
// 目标: 多个规划请求并发执行时, 同一订单至多派发给一辆车
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod concurrent_dispatch_test {
    use crate::test_helpers::{create_test_state, seed_pool, NO_REPLENISH};
    use delivery_planner::engine::events::PoolEventType;
    use delivery_planner::ShipmentStatus;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn catalog(n: usize) -> Vec<(String, i64, i64)> {
        (0..n)
            .map(|i| (format!("item-{:02}", i), 1 + (i as i64 % 7), 5 + (i as i64 * 13) % 41))
            .collect()
    }

    fn seed(state: &delivery_planner::app::AppState, n: usize) -> Vec<i64> {
        let owned = catalog(n);
        let products: Vec<(&str, i64, i64)> =
            owned.iter().map(|(name, w, v)| (name.as_str(), *w, *v)).collect();
        seed_pool(state, &products)
    }

    #[test]
    fn test_parallel_planners_never_share_orders() {
        let (_tmp, state, publisher) = create_test_state(&NO_REPLENISH);
        let seeded = seed(&state, 40);

        let api = Arc::clone(&state.delivery_api);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let api = Arc::clone(&api);
                thread::spawn(move || {
                    let mut picked = Vec::new();
                    for round in 0..3 {
                        let robot = format!("R{}-{}", t, round);
                        let response = api.generate_delivery_plan(&robot, 12).unwrap();
                        assert!(response.plan.total_weight <= 12);
                        picked.extend(response.plan.order_ids());
                    }
                    picked
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }

        let unique: HashSet<i64> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len(), "订单被重复派发");
        assert!(unique.iter().all(|id| seeded.contains(id)));

        let stats = state.delivery_api.pool_stats().unwrap();
        assert_eq!(stats.in_transit_orders, all.len());
        assert_eq!(stats.eligible_orders + stats.in_transit_orders, seeded.len());

        for id in &all {
            assert_eq!(
                state.order_api.get_order(*id).unwrap().status,
                ShipmentStatus::InTransit
            );
        }
        assert!(publisher.count(PoolEventType::PlanDispatched) > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fleet_dispatch_is_disjoint() {
        let (_tmp, state, _publisher) = create_test_state(&NO_REPLENISH);
        let seeded = seed(&state, 30);

        let requests: Vec<(String, i64)> = (0..6).map(|i| (format!("AGV-{}", i), 10)).collect();
        let results = state.delivery_api.dispatch_fleet_async(requests).await;
        assert_eq!(results.len(), 6);

        let mut all = Vec::new();
        for result in results {
            let response = result.unwrap();
            assert!(response.plan.total_weight <= 10);
            if !response.plan.is_empty() {
                assert!(response.dispatched);
            }
            all.extend(response.plan.order_ids());
        }

        let unique: HashSet<i64> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
        assert!(!all.is_empty());
        assert!(all.len() <= seeded.len());
    }

    #[tokio::test]
    async fn test_async_plan_matches_blocking_result() {
        let (_tmp, state, _publisher) = create_test_state(&NO_REPLENISH);
        seed_pool(&state, &[("a", 5, 10), ("b", 4, 40), ("c", 6, 30), ("d", 3, 50)]);

        let response = state
            .delivery_api
            .generate_delivery_plan_async("R1".to_string(), 10)
            .await
            .unwrap();

        assert!(response.dispatched);
        assert_eq!(response.plan.total_value, 90);
        assert_eq!(response.plan.total_weight, 7);
    }
}
