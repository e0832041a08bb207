//! In-memory [`IamApi`] with eventually consistent reads.
//!
//! Writes land immediately in the backing store, but the next `read_lag`
//! reads still see the state from before the write.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::aws::{AwsError, AwsResult, CreateRoleInput, IamApi, RoleRecord, UpdateRoleInput};

const ROLE: &str = "IAM Role";
const ROLE_POLICY: &str = "IAM Role Policy";

#[derive(Debug, Clone, Default)]
struct Store {
    roles: BTreeMap<String, RoleRecord>,
    policies: BTreeMap<(String, String), String>,
}

#[derive(Debug, Default)]
struct State {
    actual: Store,
    visible: Store,
    lag_remaining: usize,
    invalid_principal_failures: usize,
    errors: HashMap<&'static str, AwsError>,
    calls: Vec<String>,
    puts_in_flight: usize,
    max_puts_in_flight: usize,
}

#[derive(Debug, Default)]
pub(crate) struct FakeIam {
    read_lag: usize,
    put_latency: Duration,
    state: Mutex<State>,
}

impl FakeIam {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reads after a write see stale state this many times.
    pub(crate) fn with_read_lag(mut self, reads: usize) -> Self {
        self.read_lag = reads;
        self
    }

    /// The first `count` `create_role` calls fail as if the trust policy
    /// principal had not propagated yet.
    pub(crate) fn with_invalid_principal_failures(self, count: usize) -> Self {
        self.lock().invalid_principal_failures = count;
        self
    }

    /// Every call to `operation` fails with `error`.
    pub(crate) fn with_error(self, operation: &'static str, error: AwsError) -> Self {
        self.lock().errors.insert(operation, error);
        self
    }

    pub(crate) fn with_put_latency(mut self, latency: Duration) -> Self {
        self.put_latency = latency;
        self
    }

    pub(crate) fn with_role(self, role_name: &str, trust_policy: &str) -> Self {
        {
            let mut state = self.lock();
            let record = role_record(role_name, "/", trust_policy, None, None);
            state.actual.roles.insert(role_name.to_string(), record);
            state.visible = state.actual.clone();
        }
        self
    }

    pub(crate) fn with_role_policy(self, role_name: &str, policy_name: &str, document: &str) -> Self {
        {
            let mut state = self.lock();
            state.actual.policies.insert(
                (role_name.to_string(), policy_name.to_string()),
                document.to_string(),
            );
            state.visible = state.actual.clone();
        }
        self
    }

    pub(crate) fn calls(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    pub(crate) fn max_puts_in_flight(&self) -> usize {
        self.lock().max_puts_in_flight
    }

    pub(crate) fn stored_role(&self, role_name: &str) -> Option<RoleRecord> {
        self.lock().actual.roles.get(role_name).cloned()
    }

    pub(crate) fn stored_policy(&self, role_name: &str, policy_name: &str) -> Option<String> {
        self.lock()
            .actual
            .policies
            .get(&(role_name.to_string(), policy_name.to_string()))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and return the injected error, if any.
    fn begin(&self, operation: &'static str) -> AwsResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());
        if let Some(err) = state.errors.get(operation).cloned() {
            return Err(err);
        }
        Ok(state)
    }

    fn written(&self, state: &mut State) {
        state.lag_remaining = self.read_lag;
        if self.read_lag == 0 {
            state.visible = state.actual.clone();
        }
    }

    fn read_view<R>(&self, state: &mut State, read: impl FnOnce(&Store) -> R) -> R {
        if state.lag_remaining > 0 {
            state.lag_remaining -= 1;
        } else {
            state.visible = state.actual.clone();
        }
        read(&state.visible)
    }
}

fn role_record(
    role_name: &str,
    path: &str,
    trust_policy: &str,
    description: Option<String>,
    max_session_duration: Option<i32>,
) -> RoleRecord {
    RoleRecord {
        role_name: role_name.to_string(),
        role_id: format!("AROA{}", role_name.to_uppercase()),
        arn: format!("arn:aws:iam::123456789012:role{path}{role_name}"),
        path: path.to_string(),
        description,
        max_session_duration: max_session_duration.or(Some(3600)),
        assume_role_policy_document: Some(trust_policy.to_string()),
    }
}

#[async_trait]
impl IamApi for FakeIam {
    async fn create_role(&self, input: &CreateRoleInput) -> AwsResult<RoleRecord> {
        let mut state = self.begin("create_role")?;
        if state.invalid_principal_failures > 0 {
            state.invalid_principal_failures -= 1;
            return Err(AwsError::iam(
                "MalformedPolicyDocument",
                "Invalid principal in policy: \"AWS\":\"arn:aws:iam::123456789012:role/new\"",
            ));
        }
        if state.actual.roles.contains_key(&input.role_name) {
            return Err(AwsError::iam(
                "EntityAlreadyExists",
                format!("Role with name {} already exists.", input.role_name),
            ));
        }
        let record = role_record(
            &input.role_name,
            &input.path,
            &input.assume_role_policy_document,
            input.description.clone(),
            input.max_session_duration,
        );
        state
            .actual
            .roles
            .insert(input.role_name.clone(), record.clone());
        self.written(&mut state);
        Ok(record)
    }

    async fn get_role(&self, role_name: &str) -> AwsResult<RoleRecord> {
        let mut state = self.begin("get_role")?;
        self.read_view(&mut state, |store| store.roles.get(role_name).cloned())
            .ok_or_else(|| AwsError::not_found(ROLE, role_name))
    }

    async fn update_role(&self, role_name: &str, input: &UpdateRoleInput) -> AwsResult<()> {
        let mut state = self.begin("update_role")?;
        let role = state
            .actual
            .roles
            .get_mut(role_name)
            .ok_or_else(|| AwsError::not_found(ROLE, role_name))?;
        if let Some(description) = &input.description {
            role.description = Some(description.clone()).filter(|d| !d.is_empty());
        }
        if input.max_session_duration.is_some() {
            role.max_session_duration = input.max_session_duration;
        }
        self.written(&mut state);
        Ok(())
    }

    async fn update_assume_role_policy(
        &self,
        role_name: &str,
        policy_document: &str,
    ) -> AwsResult<()> {
        let mut state = self.begin("update_assume_role_policy")?;
        let role = state
            .actual
            .roles
            .get_mut(role_name)
            .ok_or_else(|| AwsError::not_found(ROLE, role_name))?;
        role.assume_role_policy_document = Some(policy_document.to_string());
        self.written(&mut state);
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> AwsResult<()> {
        let mut state = self.begin("delete_role")?;
        if !state.actual.roles.contains_key(role_name) {
            return Err(AwsError::not_found(ROLE, role_name));
        }
        if state.actual.policies.keys().any(|(role, _)| role == role_name) {
            return Err(AwsError::iam(
                "DeleteConflict",
                "Cannot delete entity, must delete policies first.",
            ));
        }
        state.actual.roles.remove(role_name);
        self.written(&mut state);
        Ok(())
    }

    async fn list_role_policies(&self, role_name: &str) -> AwsResult<Vec<String>> {
        let state = self.begin("list_role_policies")?;
        if !state.actual.roles.contains_key(role_name) {
            return Err(AwsError::not_found(ROLE, role_name));
        }
        Ok(state
            .actual
            .policies
            .keys()
            .filter(|(role, _)| role == role_name)
            .map(|(_, policy)| policy.clone())
            .collect())
    }

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        policy_document: &str,
    ) -> AwsResult<()> {
        {
            let mut state = self.begin("put_role_policy")?;
            if !state.actual.roles.contains_key(role_name) {
                return Err(AwsError::not_found(ROLE, role_name));
            }
            state.puts_in_flight += 1;
            state.max_puts_in_flight = state.max_puts_in_flight.max(state.puts_in_flight);
        }
        if !self.put_latency.is_zero() {
            tokio::time::sleep(self.put_latency).await;
        }
        let mut state = self.lock();
        state.puts_in_flight -= 1;
        state.actual.policies.insert(
            (role_name.to_string(), policy_name.to_string()),
            policy_document.to_string(),
        );
        self.written(&mut state);
        Ok(())
    }

    async fn get_role_policy(&self, role_name: &str, policy_name: &str) -> AwsResult<String> {
        let mut state = self.begin("get_role_policy")?;
        let key = (role_name.to_string(), policy_name.to_string());
        self.read_view(&mut state, |store| store.policies.get(&key).cloned())
            .ok_or_else(|| AwsError::not_found(ROLE_POLICY, format!("{role_name}:{policy_name}")))
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> AwsResult<()> {
        let mut state = self.begin("delete_role_policy")?;
        let key = (role_name.to_string(), policy_name.to_string());
        if state.actual.policies.remove(&key).is_none() {
            return Err(AwsError::not_found(
                ROLE_POLICY,
                format!("{role_name}:{policy_name}"),
            ));
        }
        self.written(&mut state);
        Ok(())
    }
}
