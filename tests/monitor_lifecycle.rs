use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use order_sentinel::domain::error::AppError;
use order_sentinel::domain::order::{Direction, NewOrder, Order, OrderStatus, Wallet};
use order_sentinel::infrastructure::data::store::OrderStore;
use order_sentinel::infrastructure::data::vault::SecretVault;
use order_sentinel::infrastructure::network::chain::{ChainClient, TxReceipt};
use order_sentinel::infrastructure::network::price_feed::PriceOracle;
use order_sentinel::infrastructure::network::swap_plan::{
    PlanStep, StepKind, SwapPlan, SwapPlanner, TxItem,
};
use order_sentinel::services::orders::notify::{ChannelNotifier, OrderEvent, OwnerNotification};
use order_sentinel::services::orders::{OrderExecutor, OrderMonitor};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

// Throwaway key, never funded.
const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe51296170827936ea5cce4b76994b0f";

struct FakeOracle {
    price: Mutex<Option<f64>>,
}

impl FakeOracle {
    fn at(price: f64) -> Arc<Self> {
        Arc::new(Self {
            price: Mutex::new(Some(price)),
        })
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            price: Mutex::new(None),
        })
    }

    async fn set(&self, price: f64) {
        *self.price.lock().await = Some(price);
    }
}

#[async_trait]
impl PriceOracle for FakeOracle {
    async fn price_of(&self, _token: Address) -> Result<f64, AppError> {
        (*self.price.lock().await).ok_or(AppError::ApiCall {
            provider: "fake-oracle".into(),
            status: 503,
        })
    }
}

struct FakePlanner {
    steps: usize,
    calls: AtomicUsize,
    fail: bool,
}

impl FakePlanner {
    fn with_steps(steps: usize) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            steps: 1,
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn item() -> TxItem {
        TxItem {
            to: Address::from([0xcc; 20]),
            data: vec![0xde, 0xad].into(),
            value: U256::ZERO,
            gas: Some(200_000),
            gas_price: None,
        }
    }
}

#[async_trait]
impl SwapPlanner for FakePlanner {
    async fn plan_swap(
        &self,
        _user: Address,
        _token_in: Address,
        _token_out: Address,
        _amount: U256,
    ) -> Result<SwapPlan, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::ApiCall {
                provider: "fake-planner".into(),
                status: 502,
            });
        }

        let mut steps = Vec::new();
        if self.steps > 1 {
            steps.push(PlanStep {
                kind: StepKind::Authorize,
                items: vec![Self::item()],
            });
        }
        steps.push(PlanStep {
            kind: StepKind::Swap,
            items: vec![Self::item()],
        });
        Ok(SwapPlan { steps })
    }
}

struct FakeChain {
    sent: AtomicUsize,
    /// 1-based submission index that fails with a confirmation timeout.
    fail_at: Option<usize>,
}

impl FakeChain {
    fn confirming() -> Arc<Self> {
        Arc::new(Self {
            sent: AtomicUsize::new(0),
            fail_at: None,
        })
    }

    fn failing_at(item: usize) -> Arc<Self> {
        Arc::new(Self {
            sent: AtomicUsize::new(0),
            fail_at: Some(item),
        })
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn balance_of(&self, _wallet: Address, _token: Address) -> Result<U256, AppError> {
        Ok(U256::MAX)
    }

    async fn sign_and_send(
        &self,
        _signer: &PrivateKeySigner,
        _item: &TxItem,
    ) -> Result<TxReceipt, AppError> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_at == Some(n) {
            return Err(AppError::Transaction {
                hash: None,
                reason: "confirmation not observed within 1000ms".into(),
            });
        }
        Ok(TxReceipt {
            tx_hash: format!("0x{n:064x}"),
            block_number: Some(n as u64),
        })
    }
}

struct Harness {
    store: OrderStore,
    executor: Arc<OrderExecutor>,
    monitor: Arc<OrderMonitor>,
    notifications: UnboundedReceiver<OwnerNotification>,
    planner: Arc<FakePlanner>,
}

async fn harness(
    oracle: Arc<FakeOracle>,
    planner: Arc<FakePlanner>,
    chain: Arc<FakeChain>,
) -> Harness {
    let store = OrderStore::new("sqlite::memory:").await.expect("store");
    let vault = SecretVault::new("test-passphrase");
    let (notifier, notifications) = ChannelNotifier::channel();

    let executor = Arc::new(OrderExecutor::new(
        store.clone(),
        vault,
        chain,
        planner.clone(),
        notifier.clone(),
    ));
    let monitor = Arc::new(OrderMonitor::new(
        store.clone(),
        oracle,
        executor.clone(),
        notifier,
        Duration::from_secs(5),
        4,
    ));

    Harness {
        store,
        executor,
        monitor,
        notifications,
        planner,
    }
}

async fn seed_sell_order(store: &OrderStore) -> Order {
    seed_order(store, Direction::Sell, 0.01, 500, None).await
}

async fn seed_order(
    store: &OrderStore,
    direction: Direction,
    trigger_price: f64,
    slippage_bps: u64,
    expiry_at: Option<chrono::DateTime<Utc>>,
) -> Order {
    let vault = SecretVault::new("test-passphrase");
    let signer = PrivateKeySigner::from_str(TEST_KEY).unwrap();
    store
        .create(NewOrder {
            owner: 42,
            wallet: Wallet {
                address: signer.address(),
                encrypted_secret: vault.encrypt(TEST_KEY.as_bytes()).unwrap(),
            },
            direction,
            token_in: Address::from([1u8; 20]),
            token_out: Address::ZERO,
            amount: U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64)),
            trigger_price,
            slippage_bps,
            expiry_at,
        })
        .await
        .expect("seed order")
}

#[tokio::test]
async fn eligible_sell_order_fills_with_receipt() {
    // Scenario A: trigger 0.01, 5% tolerance, price 0.0098 >= 0.0095.
    let mut h = harness(
        FakeOracle::at(0.0098),
        FakePlanner::with_steps(1),
        FakeChain::confirming(),
    )
    .await;
    let order = seed_sell_order(&h.store).await;

    h.monitor.sweep().await.unwrap();

    let filled = h.store.get(order.id).await.unwrap().unwrap();
    assert_eq!(filled.status, OrderStatus::Filled);
    assert!(filled.tx_hash.is_some());
    assert!(filled.updated_at >= order.updated_at);

    let note = h.notifications.recv().await.unwrap();
    assert_eq!(note.owner, 42);
    match note.event {
        OrderEvent::Filled {
            order_id,
            direction,
            executed_price,
            slippage_bps,
            tx_hash,
            ..
        } => {
            assert_eq!(order_id, order.id);
            assert_eq!(direction, Direction::Sell);
            assert_eq!(executed_price, 0.0098);
            assert_eq!(slippage_bps, 500);
            assert_eq!(Some(tx_hash), filled.tx_hash);
        }
        other => panic!("expected fill event, got {other:?}"),
    }
}

#[tokio::test]
async fn ineligible_order_requests_no_plan() {
    // Scenario B: price 0.009 < the 0.0095 floor.
    let h = harness(
        FakeOracle::at(0.009),
        FakePlanner::with_steps(1),
        FakeChain::confirming(),
    )
    .await;
    let order = seed_sell_order(&h.store).await;

    h.monitor.sweep().await.unwrap();

    let unchanged = h.store.get(order.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, OrderStatus::Active);
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_order_cancels_once() {
    // Scenario C: expiry in the past, price never eligible.
    let mut h = harness(
        FakeOracle::at(0.009),
        FakePlanner::with_steps(1),
        FakeChain::confirming(),
    )
    .await;
    let expiry = Utc::now() - ChronoDuration::seconds(1);
    let order = seed_order(&h.store, Direction::Sell, 0.01, 500, Some(expiry)).await;

    h.monitor.sweep().await.unwrap();

    let cancelled = h.store.get(order.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let note = h.notifications.recv().await.unwrap();
    assert!(matches!(note.event, OrderEvent::Expired { order_id } if order_id == order.id));

    // Later ticks must not touch the terminal record again.
    h.monitor.sweep().await.unwrap();
    h.monitor.sweep().await.unwrap();
    assert!(h.notifications.try_recv().is_err());
    assert_eq!(
        h.store.get(order.id).await.unwrap().unwrap().status,
        OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn order_without_expiry_is_never_auto_cancelled() {
    let h = harness(
        FakeOracle::at(0.009),
        FakePlanner::with_steps(1),
        FakeChain::confirming(),
    )
    .await;
    let order = seed_sell_order(&h.store).await;

    for _ in 0..5 {
        h.monitor.sweep().await.unwrap();
    }
    assert_eq!(
        h.store.get(order.id).await.unwrap().unwrap().status,
        OrderStatus::Active
    );
}

#[tokio::test]
async fn partial_step_failure_keeps_order_active_and_replans() {
    // Scenario D: two steps; item 1 confirms, item 2 times out.
    let h = harness(
        FakeOracle::at(0.0098),
        FakePlanner::with_steps(2),
        FakeChain::failing_at(2),
    )
    .await;
    let order = seed_sell_order(&h.store).await;

    let err = h.executor.execute(&order, 0.0098).await.unwrap_err();
    match err {
        AppError::PartialExecution {
            order_id,
            completed_steps,
            ..
        } => {
            assert_eq!(order_id, order.id);
            assert_eq!(completed_steps, 1);
        }
        other => panic!("expected partial execution, got {other}"),
    }
    assert_eq!(
        h.store.get(order.id).await.unwrap().unwrap().status,
        OrderStatus::Active
    );

    // The next tick starts over with a fresh plan.
    h.monitor.sweep().await.unwrap();
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn planner_outage_is_transient() {
    let h = harness(
        FakeOracle::at(0.0098),
        FakePlanner::unavailable(),
        FakeChain::confirming(),
    )
    .await;
    let order = seed_sell_order(&h.store).await;

    h.monitor.sweep().await.unwrap();
    assert_eq!(
        h.store.get(order.id).await.unwrap().unwrap().status,
        OrderStatus::Active
    );
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oracle_outage_skips_order_without_state_change() {
    let h = harness(
        FakeOracle::unavailable(),
        FakePlanner::with_steps(1),
        FakeChain::confirming(),
    )
    .await;
    let order = seed_sell_order(&h.store).await;

    h.monitor.sweep().await.unwrap();
    assert_eq!(
        h.store.get(order.id).await.unwrap().unwrap().status,
        OrderStatus::Active
    );
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_fill_attempts_resolve_to_exactly_one() {
    let h = harness(
        FakeOracle::at(0.0098),
        FakePlanner::with_steps(1),
        FakeChain::confirming(),
    )
    .await;
    let order = seed_sell_order(&h.store).await;

    let (a, b) = tokio::join!(
        h.executor.execute(&order, 0.0098),
        h.executor.execute(&order, 0.0098)
    );

    let outcomes = [a, b];
    let fills = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::TerminalConflict { .. })))
        .count();
    assert_eq!(fills, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(
        h.store.get(order.id).await.unwrap().unwrap().status,
        OrderStatus::Filled
    );
}

#[tokio::test]
async fn terminal_status_never_regresses() {
    let oracle = FakeOracle::at(0.0098);
    let h = harness(
        oracle.clone(),
        FakePlanner::with_steps(1),
        FakeChain::confirming(),
    )
    .await;
    let order = seed_sell_order(&h.store).await;

    h.monitor.sweep().await.unwrap();
    let after_fill = h.store.get(order.id).await.unwrap().unwrap();
    assert_eq!(after_fill.status, OrderStatus::Filled);
    let plan_calls = h.planner.calls.load(Ordering::SeqCst);

    // Keep sweeping with eligible and ineligible prices alike.
    for price in [0.0098, 0.5, 0.0001] {
        oracle.set(price).await;
        h.monitor.sweep().await.unwrap();
    }

    let still_filled = h.store.get(order.id).await.unwrap().unwrap();
    assert_eq!(still_filled.status, OrderStatus::Filled);
    assert_eq!(still_filled.tx_hash, after_fill.tx_hash);
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), plan_calls);
}

#[tokio::test]
async fn buy_band_tolerates_paying_above_target() {
    let oracle = FakeOracle::at(101.0);
    let h = harness(
        oracle.clone(),
        FakePlanner::with_steps(1),
        FakeChain::confirming(),
    )
    .await;
    let order = seed_order(&h.store, Direction::Buy, 100.0, 100, None).await;

    h.monitor.sweep().await.unwrap();
    assert_eq!(
        h.store.get(order.id).await.unwrap().unwrap().status,
        OrderStatus::Filled
    );

    // Above the band: a fresh order stays untouched.
    let second = seed_order(&h.store, Direction::Buy, 100.0, 100, None).await;
    oracle.set(101.02).await;
    h.monitor.sweep().await.unwrap();
    assert_eq!(
        h.store.get(second.id).await.unwrap().unwrap().status,
        OrderStatus::Active
    );
}
