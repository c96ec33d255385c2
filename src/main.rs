// ==========================================
// 配送计划优化系统 - 命令行入口
// ==========================================
// 用法:
//   delivery-planner [--db PATH] <command> [args...]
//
// 命令:
//   init                              建表并输出当前参数
//   import-catalog <csv>              导入商品目录
//   plan <robot_id> <capacity>        生成计划并派发
//   preview <robot_id> <capacity>     试算计划（不派发）
//   fleet <robot_id>:<capacity>...    多车并发派发
//   complete <order_id>...            批量送达
//   order <user_id> <product_id>:<qty>...  客户下单
//   stats                             订单池运行统计
//
// 结果以 JSON 输出到 stdout, 日志输出到 stderr
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use delivery_planner::app::{get_default_db_path, AppState};
use delivery_planner::domain::OrderRequestItem;
use delivery_planner::logging;
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_i64(raw: &str, what: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .with_context(|| format!("{}不是整数: {}", what, raw))
}

/// 解析 `<a>:<b>` 形式的参数
fn parse_pair(raw: &str) -> Result<(&str, &str)> {
    raw.split_once(':')
        .ok_or_else(|| anyhow!("参数格式应为 <a>:<b>: {}", raw))
}

fn usage() -> &'static str {
    "usage: delivery-planner [--db PATH] <init|import-catalog|plan|preview|fleet|complete|order|stats> [args...]"
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = match args.iter().position(|a| a == "--db") {
        Some(i) => {
            if i + 1 >= args.len() {
                bail!("--db 缺少路径参数");
            }
            let path = args.remove(i + 1);
            args.remove(i);
            path
        }
        None => get_default_db_path(),
    };

    let Some((command, rest)) = args.split_first() else {
        bail!(usage());
    };

    tracing::info!("使用数据库: {}", db_path);
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    match command.as_str() {
        "init" => print_json(&state.config)?,

        "import-catalog" => {
            let path = rest.first().ok_or_else(|| anyhow!("缺少 CSV 文件路径"))?;
            print_json(&state.catalog_importer.import_from_csv(path)?)?;
        }

        "plan" | "preview" => {
            let [robot_id, capacity] = rest else {
                bail!("用法: {} <robot_id> <capacity>", command);
            };
            let capacity = parse_i64(capacity, "载重")?;
            let response = if command == "plan" {
                state
                    .delivery_api
                    .generate_delivery_plan_async(robot_id.clone(), capacity)
                    .await?
            } else {
                state.delivery_api.preview_delivery_plan(robot_id, capacity)?
            };
            print_json(&response)?;
        }

        "fleet" => {
            if rest.is_empty() {
                bail!("用法: fleet <robot_id>:<capacity>...");
            }
            let mut requests = Vec::with_capacity(rest.len());
            for raw in rest {
                let (robot_id, capacity) = parse_pair(raw)?;
                requests.push((robot_id.to_string(), parse_i64(capacity, "载重")?));
            }
            let results = state.delivery_api.dispatch_fleet_async(requests).await;
            let output: Vec<serde_json::Value> = results
                .into_iter()
                .map(|r| match r {
                    Ok(response) => serde_json::json!({ "ok": response }),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                })
                .collect();
            print_json(&output)?;
        }

        "complete" => {
            let ids = rest
                .iter()
                .map(|raw| parse_i64(raw, "订单ID"))
                .collect::<Result<Vec<_>>>()?;
            print_json(&state.delivery_api.complete_deliveries(&ids)?)?;
        }

        "order" => {
            let (user_id, lines) = rest
                .split_first()
                .ok_or_else(|| anyhow!("用法: order <user_id> <product_id>:<qty>..."))?;
            let user_id = parse_i64(user_id, "客户ID")?;
            let mut items = Vec::with_capacity(lines.len());
            for raw in lines {
                let (product_id, quantity) = parse_pair(raw)?;
                items.push(OrderRequestItem {
                    product_id: parse_i64(product_id, "商品ID")?,
                    quantity: quantity
                        .trim()
                        .parse::<u32>()
                        .with_context(|| format!("数量不是非负整数: {}", quantity))?,
                });
            }
            print_json(&state.order_api.place_orders(user_id, &items)?)?;
        }

        "stats" => print_json(&state.delivery_api.pool_stats()?)?,

        other => bail!("未知命令: {}\n{}", other, usage()),
    }

    Ok(())
}
