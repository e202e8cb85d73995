//! Loan account aggregate

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Installment identity: the loan's project plus a 1-based sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallmentId {
    pub project_id: Uuid,
    pub sequence: u32,
}

impl InstallmentId {
    pub fn new(project_id: Uuid, sequence: u32) -> Self {
        Self { project_id, sequence }
    }
}

impl fmt::Display for InstallmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} of loan '{}'", self.sequence, self.project_id)
    }
}

/// Installment status
///
/// Overdue is normally derived on read; it is only stored after an explicit
/// advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Due,
    Overdue,
    Paid,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Overdue => "overdue",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One monthly repayment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentInstallment {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub status: InstallmentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl RepaymentInstallment {
    fn is_late(&self, as_of: NaiveDate) -> bool {
        self.status == InstallmentStatus::Due && self.due_date < as_of
    }
}

/// Repayment schedule for a funded project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanAccount {
    pub project_id: Uuid,
    pub principal: Decimal,
    pub start_date: NaiveDate,
    pub installments: Vec<RepaymentInstallment>,
    pub created_at: DateTime<Utc>,
}

/// Repayment progress of a loan at a given date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub project_id: Uuid,
    pub principal: Decimal,
    pub paid: Decimal,
    pub outstanding: Decimal,
    pub paid_count: usize,
    pub overdue_count: usize,
    pub next_due: Option<RepaymentInstallment>,
}

/// Longest schedule accepted, in monthly installments (100 years)
pub const MAX_INSTALLMENTS: u32 = 1200;

impl LoanAccount {
    /// Build `count` equal monthly installments, the first due one month
    /// after `start_date`
    ///
    /// Amounts are truncated to cents and the last installment takes the
    /// remainder, so the schedule always sums to the principal.
    pub fn new(project_id: Uuid, principal: Decimal, count: u32, start_date: NaiveDate) -> Result<Self> {
        if count == 0 {
            return Err(Error::Validation(
                "installment count must be at least 1".to_string(),
            ));
        }
        if count > MAX_INSTALLMENTS {
            return Err(Error::Validation(format!(
                "installment count {} exceeds the maximum of {}",
                count, MAX_INSTALLMENTS
            )));
        }
        if principal <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "loan amount must be positive, got {}",
                principal
            )));
        }

        let base = (principal / Decimal::from(count)).round_dp_with_strategy(2, RoundingStrategy::ToZero);
        if base <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "{} cannot be split into {} installments",
                principal, count
            )));
        }
        let last = principal - base * Decimal::from(count - 1);

        let mut installments = Vec::with_capacity(count as usize);
        for sequence in 1..=count {
            let due_date = start_date
                .checked_add_months(Months::new(sequence))
                .ok_or_else(|| Error::Validation(format!("installment {} falls outside the calendar", sequence)))?;
            installments.push(RepaymentInstallment {
                sequence,
                due_date,
                amount: if sequence == count { last } else { base },
                status: InstallmentStatus::Due,
                paid_at: None,
            });
        }

        Ok(Self {
            project_id,
            principal,
            start_date,
            installments,
            created_at: Utc::now(),
        })
    }

    pub fn installment(&self, sequence: u32) -> Option<&RepaymentInstallment> {
        self.installments.iter().find(|i| i.sequence == sequence)
    }

    /// Mark one installment paid
    pub(crate) fn pay(&mut self, sequence: u32, paid_at: DateTime<Utc>) -> Result<&RepaymentInstallment> {
        let id = InstallmentId::new(self.project_id, sequence);
        let installment = self
            .installments
            .iter_mut()
            .find(|i| i.sequence == sequence)
            .ok_or(Error::InstallmentNotFound(id))?;

        if installment.status == InstallmentStatus::Paid {
            return Err(Error::AlreadyPaid(id));
        }
        installment.status = InstallmentStatus::Paid;
        installment.paid_at = Some(paid_at);
        Ok(installment)
    }

    /// Store Overdue on every late installment, returning how many changed
    pub(crate) fn advance_overdue(&mut self, as_of: NaiveDate) -> usize {
        let mut changed = 0;
        for installment in self.installments.iter_mut().filter(|i| i.is_late(as_of)) {
            installment.status = InstallmentStatus::Overdue;
            changed += 1;
        }
        changed
    }

    /// The schedule as it reads on `as_of`, with late installments as Overdue
    pub fn view_as_of(&self, as_of: NaiveDate) -> Self {
        let mut view = self.clone();
        view.advance_overdue(as_of);
        view
    }

    pub fn summary(&self, as_of: NaiveDate) -> LoanSummary {
        let view = self.view_as_of(as_of);
        let paid: Decimal = view
            .installments
            .iter()
            .filter(|i| i.status == InstallmentStatus::Paid)
            .map(|i| i.amount)
            .sum();

        LoanSummary {
            project_id: self.project_id,
            principal: self.principal,
            paid,
            outstanding: self.principal - paid,
            paid_count: view.count_with(InstallmentStatus::Paid),
            overdue_count: view.count_with(InstallmentStatus::Overdue),
            next_due: view
                .installments
                .iter()
                .find(|i| i.status != InstallmentStatus::Paid)
                .cloned(),
        }
    }

    fn count_with(&self, status: InstallmentStatus) -> usize {
        self.installments.iter().filter(|i| i.status == status).count()
    }

    /// Installment amounts must add up to the principal
    pub fn check_invariants(&self) -> Result<()> {
        let total: Decimal = self.installments.iter().map(|i| i.amount).sum();
        if total != self.principal {
            return Err(Error::DataIntegrity(format!(
                "loan {} installments sum to {} instead of {}",
                self.project_id, total, self.principal
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_equal_installments() {
        let loan = LoanAccount::new(Uuid::new_v4(), dec!(75000), 12, date(2025, 1, 15)).unwrap();
        assert_eq!(loan.installments.len(), 12);
        assert!(loan.installments.iter().all(|i| i.amount == dec!(6250)));
        assert_eq!(loan.installments[0].due_date, date(2025, 2, 15));
        assert_eq!(loan.installments[11].due_date, date(2026, 1, 15));
        assert!(loan.check_invariants().is_ok());
    }

    #[test]
    fn test_remainder_goes_to_last_installment() {
        let loan = LoanAccount::new(Uuid::new_v4(), dec!(100), 3, date(2025, 1, 31)).unwrap();
        let amounts: Vec<Decimal> = loan.installments.iter().map(|i| i.amount).collect();
        assert_eq!(amounts, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
        // month ends clamp
        assert_eq!(loan.installments[0].due_date, date(2025, 2, 28));
        assert!(loan.check_invariants().is_ok());
    }

    #[test]
    fn test_rejects_bad_terms() {
        let project_id = Uuid::new_v4();
        let start = date(2025, 1, 1);
        for (principal, count) in [
            (dec!(1000), 0),
            (dec!(0), 12),
            (dec!(-5), 3),
            (dec!(0.01), 2),
            (dec!(1000000000000), 4_000_000_000),
            (dec!(1000000), MAX_INSTALLMENTS + 1),
        ] {
            let error = LoanAccount::new(project_id, principal, count, start).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_longest_schedule_is_accepted() {
        let loan = LoanAccount::new(Uuid::new_v4(), dec!(120000), MAX_INSTALLMENTS, date(2025, 1, 31)).unwrap();
        assert_eq!(loan.installments.len(), MAX_INSTALLMENTS as usize);
        assert_eq!(loan.installments[0].due_date, date(2025, 2, 28));
        assert_eq!(loan.installments.last().unwrap().due_date, date(2125, 1, 31));
        loan.check_invariants().unwrap();
    }

    #[test]
    fn test_pay_once() {
        let mut loan = LoanAccount::new(Uuid::new_v4(), dec!(75000), 12, date(2025, 1, 1)).unwrap();
        let paid_at = Utc::now();
        loan.pay(3, paid_at).unwrap();

        assert_eq!(loan.installment(3).unwrap().status, InstallmentStatus::Paid);
        assert_eq!(loan.installment(3).unwrap().paid_at, Some(paid_at));
        assert!(loan
            .installments
            .iter()
            .filter(|i| i.sequence != 3)
            .all(|i| i.status == InstallmentStatus::Due));

        assert!(matches!(loan.pay(3, paid_at), Err(Error::AlreadyPaid(_))));
        assert!(matches!(loan.pay(13, paid_at), Err(Error::InstallmentNotFound(_))));
    }

    #[test]
    fn test_overdue_is_derived_on_read() {
        let loan = LoanAccount::new(Uuid::new_v4(), dec!(3000), 3, date(2025, 1, 10)).unwrap();
        let view = loan.view_as_of(date(2025, 3, 11));

        assert_eq!(view.installments[0].status, InstallmentStatus::Overdue);
        assert_eq!(view.installments[1].status, InstallmentStatus::Overdue);
        assert_eq!(view.installments[2].status, InstallmentStatus::Due);
        // stored state untouched
        assert!(loan.installments.iter().all(|i| i.status == InstallmentStatus::Due));
    }

    #[test]
    fn test_overdue_installment_can_be_paid() {
        let mut loan = LoanAccount::new(Uuid::new_v4(), dec!(3000), 3, date(2025, 1, 10)).unwrap();
        assert_eq!(loan.advance_overdue(date(2025, 2, 11)), 1);
        assert_eq!(loan.installments[0].status, InstallmentStatus::Overdue);

        loan.pay(1, Utc::now()).unwrap();
        assert_eq!(loan.installments[0].status, InstallmentStatus::Paid);
        assert_eq!(loan.advance_overdue(date(2025, 2, 11)), 0);
    }

    #[test]
    fn test_summary() {
        let mut loan = LoanAccount::new(Uuid::new_v4(), dec!(3000), 3, date(2025, 1, 10)).unwrap();
        loan.pay(1, Utc::now()).unwrap();

        let summary = loan.summary(date(2025, 3, 20));
        assert_eq!(summary.paid, dec!(1000));
        assert_eq!(summary.outstanding, dec!(2000));
        assert_eq!(summary.paid_count, 1);
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.next_due.map(|i| i.sequence), Some(2));
    }

    #[test]
    fn test_installment_id_display() {
        let project_id = Uuid::nil();
        assert_eq!(
            InstallmentId::new(project_id, 3).to_string(),
            "#3 of loan '00000000-0000-0000-0000-000000000000'"
        );
    }
}
