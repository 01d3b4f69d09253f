//! # テスト用モック実装
//!
//! ユースケーステストで使用するインメモリのリポジトリ / メーラー。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! sendflow-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! 各モックは `Arc<Mutex<_>>` でストアを共有する Clone ハンドルとして振る舞い、
//! テスト側が同じハンドルから投入・検証できる。

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sendflow_domain::{
    audit_log::CampaignAuditLog,
    campaign::{Campaign, CampaignId, CampaignStatus, Schedule},
    credit::{CreditGrant, DebitPlan},
    delivery::{DeliveryError, OutboundEmail},
    user::UserId,
};

use crate::{
    error::InfraError,
    mailer::CampaignMailer,
    repository::{
        AuditLogRepository,
        CampaignRepository,
        ContactRepository,
        CreditRepository,
    },
};

// ===== MockCampaignRepository =====

#[derive(Clone, Default)]
pub struct MockCampaignRepository {
    campaigns: Arc<Mutex<Vec<Campaign>>>,
}

impl MockCampaignRepository {
    pub fn new() -> Self {
        Self {
            campaigns: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        self.campaigns.lock().unwrap().push(campaign);
    }

    pub fn find_by_id(&self, id: &CampaignId) -> Option<Campaign> {
        self.campaigns
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id() == id)
            .cloned()
    }
}

#[async_trait]
impl CampaignRepository for MockCampaignRepository {
    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
        lookback: Duration,
    ) -> Result<Vec<Campaign>, InfraError> {
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                c.status() == CampaignStatus::Scheduled && c.schedule().due_once(now, lookback)
            })
            .cloned()
            .collect())
    }

    async fn find_active_recurring(&self, _now: DateTime<Utc>) -> Result<Vec<Campaign>, InfraError> {
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                c.status() == CampaignStatus::Scheduled
                    && matches!(c.schedule(), Schedule::Recurring { .. })
            })
            .cloned()
            .collect())
    }

    async fn claim(&self, id: &CampaignId, now: DateTime<Utc>) -> Result<bool, InfraError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let Some(pos) = campaigns
            .iter()
            .position(|c| c.id() == id && c.status() == CampaignStatus::Scheduled)
        else {
            return Ok(false);
        };
        let claimed = campaigns[pos]
            .clone()
            .claimed(now)
            .map_err(|e| InfraError::unexpected(e.to_string()))?;
        campaigns[pos] = claimed;
        Ok(true)
    }

    async fn save(&self, campaign: &Campaign) -> Result<(), InfraError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        match campaigns.iter().position(|c| c.id() == campaign.id()) {
            Some(pos) => campaigns[pos] = campaign.clone(),
            None => campaigns.push(campaign.clone()),
        }
        Ok(())
    }

    async fn record_recurring_fire(
        &self,
        id: &CampaignId,
        last_sent_at: DateTime<Utc>,
        _sent_increment: u32,
    ) -> Result<(), InfraError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        if let Some(pos) = campaigns.iter().position(|c| c.id() == id) {
            let fired = campaigns[pos]
                .clone()
                .recurring_fired(last_sent_at)
                .map_err(|e| InfraError::unexpected(e.to_string()))?;
            campaigns[pos] = fired;
        }
        Ok(())
    }
}

// ===== MockCreditRepository =====

#[derive(Clone)]
pub struct MockCreditRepository {
    grants: Arc<Mutex<Vec<CreditGrant>>>,
    base_allowance: Arc<Mutex<i64>>,
    applied_plans: Arc<Mutex<Vec<DebitPlan>>>,
}

impl MockCreditRepository {
    pub fn new(base_allowance: i64) -> Self {
        Self {
            grants: Arc::new(Mutex::new(Vec::new())),
            base_allowance: Arc::new(Mutex::new(base_allowance)),
            applied_plans: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_grant(&self, grant: CreditGrant) {
        self.grants.lock().unwrap().push(grant);
    }

    /// 適用済みの引き落とし計画（検証用）
    pub fn applied_plans(&self) -> Vec<DebitPlan> {
        self.applied_plans.lock().unwrap().clone()
    }

    pub fn current_base_allowance(&self) -> i64 {
        *self.base_allowance.lock().unwrap()
    }

    pub fn current_grants(&self) -> Vec<CreditGrant> {
        self.grants.lock().unwrap().clone()
    }
}

#[async_trait]
impl CreditRepository for MockCreditRepository {
    async fn find_grants(&self, user_id: &UserId) -> Result<Vec<CreditGrant>, InfraError> {
        Ok(self
            .grants
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.user_id == *user_id && g.remaining > 0)
            .cloned()
            .collect())
    }

    async fn base_allowance(&self, _user_id: &UserId) -> Result<i64, InfraError> {
        Ok(*self.base_allowance.lock().unwrap())
    }

    async fn apply_debit(&self, _user_id: &UserId, plan: &DebitPlan) -> Result<i64, InfraError> {
        let mut grants = self.grants.lock().unwrap();
        for debit in &plan.grant_debits {
            let Some(grant) = grants.iter_mut().find(|g| g.id == debit.grant_id) else {
                return Err(InfraError::conflict("CreditGrant", debit.grant_id.to_string()));
            };
            if grant.remaining < debit.amount {
                return Err(InfraError::conflict("CreditGrant", debit.grant_id.to_string()));
            }
            grant.remaining -= debit.amount;
        }

        let mut base = self.base_allowance.lock().unwrap();
        *base = (*base - plan.base_debit).max(0);

        self.applied_plans.lock().unwrap().push(plan.clone());
        Ok(*base)
    }
}

// ===== MockAuditLogRepository =====

#[derive(Clone, Default)]
pub struct MockAuditLogRepository {
    logs: Arc<Mutex<Vec<CampaignAuditLog>>>,
}

impl MockAuditLogRepository {
    pub fn new() -> Self {
        Self {
            logs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn logs(&self) -> Vec<CampaignAuditLog> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLogRepository for MockAuditLogRepository {
    async fn insert(&self, log: &CampaignAuditLog) -> Result<(), InfraError> {
        self.logs.lock().unwrap().push(log.clone());
        Ok(())
    }
}

// ===== MockContactRepository =====

#[derive(Clone, Default)]
pub struct MockContactRepository {
    addresses: Arc<Mutex<Vec<String>>>,
}

impl MockContactRepository {
    pub fn new() -> Self {
        Self {
            addresses: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_address(&self, address: impl Into<String>) {
        self.addresses.lock().unwrap().push(address.into());
    }
}

#[async_trait]
impl ContactRepository for MockContactRepository {
    async fn list_addresses(&self, _user_id: &UserId) -> Result<Vec<String>, InfraError> {
        Ok(self.addresses.lock().unwrap().clone())
    }
}

// ===== MockMailer =====

/// 送信を記録するだけのメーラー
///
/// `fail_for` で登録したアドレス宛の送信は `DeliveryError::SendFailed` を返す。
/// 部分失敗シナリオのテストに使用する。
#[derive(Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    fail_addresses: Arc<Mutex<HashSet<String>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_addresses: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// 指定アドレス宛の送信を失敗させる
    pub fn fail_for(&self, address: impl Into<String>) {
        self.fail_addresses.lock().unwrap().insert(address.into());
    }

    /// 送信に成功したメール（検証用）
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl CampaignMailer for MockMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        if self.fail_addresses.lock().unwrap().contains(&email.to) {
            return Err(DeliveryError::SendFailed(format!(
                "550 mailbox unavailable: {}",
                email.to
            )));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
