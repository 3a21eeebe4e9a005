//! In-process store implementing every repository trait.
//!
//! Copy counts live in per-item atomics updated with compare-and-swap
//! loops, so reserving a copy never takes a lock. Loans are kept behind a
//! mutex that is never held across an await point.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{ItemsRepository, LoansRepository, MembersRepository};
use crate::{
    error::{AppError, AppResult},
    models::{
        item::{CreateItem, Item},
        loan::{Loan, LoanDetails, NewLoan},
        member::{CreateMember, Member, MemberActivity},
    },
};

struct ItemSlot {
    id: i32,
    title: String,
    isbn: Option<String>,
    total_copies: i32,
    available_copies: AtomicI32,
}

impl ItemSlot {
    fn snapshot(&self) -> Item {
        Item {
            id: self.id,
            title: self.title.clone(),
            isbn: self.isbn.clone(),
            total_copies: self.total_copies,
            available_copies: self.available_copies.load(Ordering::Acquire),
        }
    }

    /// Apply `step` to the available count while `allowed` holds for the
    /// value being replaced
    fn compare_and_step(&self, step: i32, allowed: impl Fn(i32) -> bool) -> Option<i32> {
        let mut current = self.available_copies.load(Ordering::Acquire);
        loop {
            if !allowed(current) {
                return None;
            }
            match self.available_copies.compare_exchange_weak(
                current,
                current + step,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(current + step),
                Err(actual) => current = actual,
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<i32, Arc<ItemSlot>>>,
    members: RwLock<BTreeMap<i32, Member>>,
    loans: Mutex<BTreeMap<i32, Loan>>,
    next_item_id: AtomicI32,
    next_member_id: AtomicI32,
    next_loan_id: AtomicI32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: i32) -> AppResult<Arc<ItemSlot>> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    fn loans(&self) -> MutexGuard<'_, BTreeMap<i32, Loan>> {
        self.loans.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn details(&self, loan: &Loan) -> AppResult<LoanDetails> {
        let item = self.slot(loan.item_id)?;
        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        let member = members.get(&loan.member_id).ok_or_else(|| {
            AppError::NotFound(format!("Member with id {} not found", loan.member_id))
        })?;

        Ok(LoanDetails {
            loan: loan.clone(),
            item_title: item.title.clone(),
            member_username: member.username.clone(),
            member_email: member.email.clone(),
        })
    }

    fn select_details(&self, filter: impl Fn(&Loan) -> bool) -> AppResult<Vec<LoanDetails>> {
        let mut selected: Vec<Loan> = self.loans().values().filter(|l| filter(l)).cloned().collect();
        selected.sort_by_key(|l| (l.due_date, l.id));
        selected.iter().map(|l| self.details(l)).collect()
    }
}

#[async_trait]
impl ItemsRepository for MemoryStore {
    async fn create(&self, item: &CreateItem) -> AppResult<Item> {
        let id = self.next_item_id.fetch_add(1, Ordering::Relaxed) + 1;
        let slot = Arc::new(ItemSlot {
            id,
            title: item.title.clone(),
            isbn: item.isbn.clone(),
            total_copies: item.total_copies,
            available_copies: AtomicI32::new(item.total_copies),
        });
        let created = slot.snapshot();
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, slot);
        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Item> {
        Ok(self.slot(id)?.snapshot())
    }

    async fn list(&self) -> AppResult<Vec<Item>> {
        let mut items: Vec<Item> = self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|slot| slot.snapshot())
            .collect();
        items.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn take_copy(&self, id: i32) -> AppResult<Option<i32>> {
        Ok(self.slot(id)?.compare_and_step(-1, |available| available > 0))
    }

    async fn put_back_copy(&self, id: i32) -> AppResult<Option<i32>> {
        let slot = self.slot(id)?;
        let total = slot.total_copies;
        Ok(slot.compare_and_step(1, |available| available < total))
    }

    async fn set_available(
        &self,
        id: i32,
        previous: i32,
        available_copies: i32,
    ) -> AppResult<bool> {
        Ok(self
            .slot(id)?
            .available_copies
            .compare_exchange(previous, available_copies, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }
}

#[async_trait]
impl MembersRepository for MemoryStore {
    async fn create(&self, member: &CreateMember) -> AppResult<Member> {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        if members.values().any(|m| m.username == member.username) {
            return Err(AppError::Validation(format!(
                "Username {} is already taken",
                member.username
            )));
        }

        let id = self.next_member_id.fetch_add(1, Ordering::Relaxed) + 1;
        let created = Member {
            id,
            username: member.username.clone(),
            email: member.email.clone(),
        };
        members.insert(id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<Member>> {
        let mut members: Vec<Member> = self
            .members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(members)
    }

    async fn top_active(&self, limit: i64) -> AppResult<Vec<MemberActivity>> {
        let mut counts: BTreeMap<i32, i64> = BTreeMap::new();
        for loan in self.loans().values().filter(|l| !l.is_returned) {
            *counts.entry(loan.member_id).or_default() += 1;
        }

        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        let mut activity: Vec<MemberActivity> = counts
            .into_iter()
            .filter_map(|(member_id, active_loans)| {
                members.get(&member_id).map(|m| MemberActivity {
                    id: m.id,
                    username: m.username.clone(),
                    email: m.email.clone(),
                    active_loans,
                })
            })
            .collect();
        activity.sort_by(|a, b| b.active_loans.cmp(&a.active_loans).then(a.id.cmp(&b.id)));
        activity.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(activity)
    }
}

#[async_trait]
impl LoansRepository for MemoryStore {
    async fn insert(&self, loan: &NewLoan) -> AppResult<Loan> {
        self.slot(loan.item_id)?;
        MembersRepository::get_by_id(self, loan.member_id).await?;

        let id = self.next_loan_id.fetch_add(1, Ordering::Relaxed) + 1;
        let created = Loan {
            id,
            item_id: loan.item_id,
            member_id: loan.member_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            is_returned: false,
        };
        self.loans().insert(id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        self.loans()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn get_details(&self, id: i32) -> AppResult<LoanDetails> {
        let loan = LoansRepository::get_by_id(self, id).await?;
        self.details(&loan)
    }

    async fn find_active(&self, item_id: i32, member_id: i32) -> AppResult<Option<Loan>> {
        Ok(self
            .loans()
            .values()
            .filter(|l| l.item_id == item_id && l.member_id == member_id && !l.is_returned)
            .min_by_key(|l| (l.loan_date, l.id))
            .cloned())
    }

    async fn mark_returned(&self, id: i32, return_date: NaiveDate) -> AppResult<bool> {
        let mut loans = self.loans();
        match loans.get_mut(&id) {
            Some(loan) if !loan.is_returned => {
                loan.is_returned = true;
                loan.return_date = Some(return_date);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AppError::NotFound(format!("Loan with id {} not found", id))),
        }
    }

    async fn update_due_date(
        &self,
        id: i32,
        expected: NaiveDate,
        due_date: NaiveDate,
    ) -> AppResult<bool> {
        let mut loans = self.loans();
        match loans.get_mut(&id) {
            Some(loan) if !loan.is_returned && loan.due_date == expected => {
                loan.due_date = due_date;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AppError::NotFound(format!("Loan with id {} not found", id))),
        }
    }

    async fn list_overdue(&self, today: NaiveDate) -> AppResult<Vec<LoanDetails>> {
        self.select_details(|l| l.is_overdue(today))
    }

    async fn list_for_member(&self, member_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.select_details(|l| l.member_id == member_id && !l.is_returned)
    }

    async fn count_active_for_item(&self, item_id: i32) -> AppResult<i64> {
        Ok(self
            .loans()
            .values()
            .filter(|l| l.item_id == item_id && !l.is_returned)
            .count() as i64)
    }

    async fn count_active(&self) -> AppResult<i64> {
        Ok(self.loans().values().filter(|l| !l.is_returned).count() as i64)
    }

    async fn count_overdue(&self, today: NaiveDate) -> AppResult<i64> {
        Ok(self.loans().values().filter(|l| l.is_overdue(today)).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn store_with_item(copies: i32) -> (Arc<MemoryStore>, Item) {
        let store = Arc::new(MemoryStore::new());
        let item = ItemsRepository::create(
            store.as_ref(),
            &CreateItem {
                title: "Dune".to_string(),
                isbn: None,
                total_copies: copies,
            },
        )
        .await
        .unwrap();
        (store, item)
    }

    #[tokio::test]
    async fn test_take_copy_stops_at_zero() {
        let (store, item) = store_with_item(1).await;
        assert_eq!(store.take_copy(item.id).await.unwrap(), Some(0));
        assert_eq!(store.take_copy(item.id).await.unwrap(), None);
        let item = ItemsRepository::get_by_id(store.as_ref(), item.id).await.unwrap();
        assert_eq!(item.available_copies, 0);
    }

    #[tokio::test]
    async fn test_put_back_copy_stops_at_capacity() {
        let (store, item) = store_with_item(2).await;
        assert_eq!(store.put_back_copy(item.id).await.unwrap(), None);
        store.take_copy(item.id).await.unwrap();
        assert_eq!(store.put_back_copy(item.id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_set_available_only_replaces_expected_count() {
        let (store, item) = store_with_item(3).await;
        store.take_copy(item.id).await.unwrap();

        // Stale read of 3 loses against the take
        assert!(!store.set_available(item.id, 3, 3).await.unwrap());
        assert!(store.set_available(item.id, 2, 3).await.unwrap());
        let item = ItemsRepository::get_by_id(store.as_ref(), item.id).await.unwrap();
        assert_eq!(item.available_copies, 3);
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.take_copy(42).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_takes_never_oversell() {
        let (store, item) = store_with_item(3).await;

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.take_copy(item.id).await.unwrap() })
            })
            .collect();

        let mut taken = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                taken += 1;
            }
        }

        assert_eq!(taken, 3);
        let item = ItemsRepository::get_by_id(store.as_ref(), item.id).await.unwrap();
        assert_eq!(item.available_copies, 0);
    }

    #[tokio::test]
    async fn test_conditional_loan_updates() {
        let (store, item) = store_with_item(1).await;
        let member = MembersRepository::create(
            store.as_ref(),
            &CreateMember {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            },
        )
        .await
        .unwrap();
        let loan = store
            .insert(&NewLoan::new(item.id, member.id, date(2024, 3, 1), 14).unwrap())
            .await
            .unwrap();

        assert!(!store
            .update_due_date(loan.id, date(2024, 3, 20), date(2024, 3, 25))
            .await
            .unwrap());
        assert!(store
            .update_due_date(loan.id, date(2024, 3, 15), date(2024, 3, 25))
            .await
            .unwrap());
        assert!(store.mark_returned(loan.id, date(2024, 3, 10)).await.unwrap());
        assert!(!store.mark_returned(loan.id, date(2024, 3, 11)).await.unwrap());
        assert!(store.find_active(item.id, member.id).await.unwrap().is_none());
    }
}
