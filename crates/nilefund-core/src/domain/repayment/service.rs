//! Repayment scheduler service

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use super::entity::{InstallmentId, LoanAccount, LoanSummary, RepaymentInstallment};
use crate::domain::locking::{LockConfig, LockedRegistry, ResourceType};
use crate::error::{Error, Result};

/// Owner of every loan account, one per project
#[derive(Debug)]
pub struct RepaymentScheduler {
    loans: LockedRegistry<LoanAccount>,
}

impl RepaymentScheduler {
    pub fn new(config: LockConfig) -> Self {
        Self {
            loans: LockedRegistry::new(ResourceType::LoanAccount, config),
        }
    }

    /// Create the monthly schedule for a project's loan
    pub async fn create_schedule(
        &self,
        project_id: Uuid,
        total_amount: Decimal,
        installment_count: u32,
        start_date: NaiveDate,
    ) -> Result<LoanAccount> {
        let loan = LoanAccount::new(project_id, total_amount, installment_count, start_date)?;
        if !self.loans.insert(project_id, loan.clone()).await {
            return Err(Error::Validation(format!(
                "project '{}' already has a loan account",
                project_id
            )));
        }

        info!(
            project_id = %project_id,
            principal = %total_amount,
            installments = installment_count,
            "Repayment schedule created"
        );
        Ok(loan)
    }

    /// Due or Overdue -> Paid
    pub async fn record_payment(&self, installment_id: InstallmentId) -> Result<RepaymentInstallment> {
        let mut guard = self
            .loans
            .lock(installment_id.project_id)
            .await?
            .ok_or(Error::LoanNotFound(installment_id.project_id))?;

        let mut draft = (*guard).clone();
        let installment = draft.pay(installment_id.sequence, Utc::now())?.clone();
        draft.check_invariants()?;
        *guard = draft;

        info!(
            project_id = %installment_id.project_id,
            sequence = installment.sequence,
            amount = %installment.amount,
            "Installment paid"
        );
        Ok(installment)
    }

    /// The schedule as read on `as_of`, late installments reported Overdue
    pub async fn schedule(&self, project_id: Uuid, as_of: NaiveDate) -> Result<LoanAccount> {
        debug!(project_id = %project_id, as_of = %as_of, "Reading repayment schedule");
        Ok(self.get_loan(project_id).await?.view_as_of(as_of))
    }

    /// Persist Overdue on every installment late at `as_of`
    pub async fn advance_overdue(&self, project_id: Uuid, as_of: NaiveDate) -> Result<LoanAccount> {
        let mut guard = self
            .loans
            .lock(project_id)
            .await?
            .ok_or(Error::LoanNotFound(project_id))?;

        let changed = guard.advance_overdue(as_of);
        if changed > 0 {
            info!(project_id = %project_id, as_of = %as_of, changed = changed, "Installments marked overdue");
        }
        Ok((*guard).clone())
    }

    pub async fn loan_summary(&self, project_id: Uuid, as_of: NaiveDate) -> Result<LoanSummary> {
        Ok(self.get_loan(project_id).await?.summary(as_of))
    }

    /// Stored loan, without derived statuses
    pub async fn get_loan(&self, project_id: Uuid) -> Result<LoanAccount> {
        self.loans
            .get(project_id)
            .await?
            .ok_or(Error::LoanNotFound(project_id))
    }

    /// Every loan, ordered by project id
    pub async fn all_loans(&self) -> Result<Vec<LoanAccount>> {
        self.loans.snapshot().await
    }

    pub(crate) async fn load(&self, loans: Vec<LoanAccount>) -> Result<()> {
        for loan in &loans {
            loan.check_invariants()?;
        }
        self.loans
            .replace_all(loans.into_iter().map(|loan| (loan.project_id, loan)))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repayment::InstallmentStatus;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn scheduler() -> RepaymentScheduler {
        RepaymentScheduler::new(LockConfig::default())
    }

    #[tokio::test]
    async fn test_pay_one_installment() {
        let scheduler = scheduler();
        let project_id = Uuid::new_v4();
        scheduler.create_schedule(project_id, dec!(75000), 12, start()).await.unwrap();

        let paid = scheduler
            .record_payment(InstallmentId::new(project_id, 3))
            .await
            .unwrap();
        assert_eq!(paid.status, InstallmentStatus::Paid);

        let loan = scheduler.get_loan(project_id).await.unwrap();
        let paid_sequences: Vec<u32> = loan
            .installments
            .iter()
            .filter(|i| i.status == InstallmentStatus::Paid)
            .map(|i| i.sequence)
            .collect();
        assert_eq!(paid_sequences, vec![3]);

        let error = scheduler
            .record_payment(InstallmentId::new(project_id, 3))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AlreadyPaid);
    }

    #[tokio::test]
    async fn test_one_loan_per_project() {
        let scheduler = scheduler();
        let project_id = Uuid::new_v4();
        scheduler.create_schedule(project_id, dec!(1000), 2, start()).await.unwrap();

        let error = scheduler
            .create_schedule(project_id, dec!(5000), 5, start())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(scheduler.get_loan(project_id).await.unwrap().principal, dec!(1000));
    }

    #[tokio::test]
    async fn test_unknown_loan_and_installment() {
        let scheduler = scheduler();
        let error = scheduler
            .record_payment(InstallmentId::new(Uuid::new_v4(), 1))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::LoanNotFound(_)));

        let project_id = Uuid::new_v4();
        scheduler.create_schedule(project_id, dec!(1000), 2, start()).await.unwrap();
        let error = scheduler
            .record_payment(InstallmentId::new(project_id, 0))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InstallmentNotFound(_)));
    }

    #[tokio::test]
    async fn test_schedule_read_does_not_persist_overdue() {
        let scheduler = scheduler();
        let project_id = Uuid::new_v4();
        scheduler.create_schedule(project_id, dec!(1200), 12, start()).await.unwrap();
        let as_of = NaiveDate::from_ymd_opt(2025, 4, 15).unwrap();

        let view = scheduler.schedule(project_id, as_of).await.unwrap();
        assert_eq!(
            view.installments.iter().filter(|i| i.status == InstallmentStatus::Overdue).count(),
            3
        );
        let stored = scheduler.get_loan(project_id).await.unwrap();
        assert!(stored.installments.iter().all(|i| i.status == InstallmentStatus::Due));

        let advanced = scheduler.advance_overdue(project_id, as_of).await.unwrap();
        assert_eq!(advanced, scheduler.get_loan(project_id).await.unwrap());
        assert_eq!(advanced.installments[2].status, InstallmentStatus::Overdue);

        let summary = scheduler.loan_summary(project_id, as_of).await.unwrap();
        assert_eq!(summary.overdue_count, 3);
        assert_eq!(summary.outstanding, dec!(1200));
    }
}
