use serde::{Deserialize, Serialize};
use worldforge_common::{ConstructorArg, InstanceHandle, TemplateId};
use worldforge_kernel::{Deployer, WorldDispatch};

use crate::config::{ConfigStore, FactoryConfig, FactorySettings};
use crate::error::{FactoryError, SpawnError};
use crate::journal::{Effect, FactoryEvent, SpawnJournal};
use crate::meter::StepMeter;
use crate::registration::register_all;

/// Input to [`WorldFactory::spawn`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub name: String,
    #[serde(default)]
    pub component_ids: Vec<TemplateId>,
    #[serde(default)]
    pub system_ids: Vec<TemplateId>,
}

impl SpawnRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_components(mut self, ids: impl IntoIterator<Item = TemplateId>) -> Self {
        self.component_ids.extend(ids);
        self
    }

    pub fn with_systems(mut self, ids: impl IntoIterator<Item = TemplateId>) -> Self {
        self.system_ids.extend(ids);
        self
    }
}

/// Creates worlds from the configured template and populates them.
///
/// The factory owns its configuration and the log of delivered notifications.
/// The ledger it deploys into is passed to each call.
///
/// `spawn` is all-or-nothing: if deployment or any registration fails, every
/// effect already applied is compensated and the staged `WorldCreated`
/// notification is dropped.
#[derive(Debug, Default)]
pub struct WorldFactory {
    config: ConfigStore,
    settings: FactorySettings,
    event_log: Vec<FactoryEvent>,
}

impl WorldFactory {
    /// An uninitialized factory. Call [`initialize`](Self::initialize) before spawning.
    pub fn new(settings: FactorySettings) -> Self {
        Self {
            config: ConfigStore::new(),
            settings,
            event_log: Vec::new(),
        }
    }

    /// Construct and initialize in one step.
    pub fn with_config(
        world_template_id: TemplateId,
        executor_handle: InstanceHandle,
        settings: FactorySettings,
    ) -> Result<Self, FactoryError> {
        let mut factory = Self::new(settings);
        factory.initialize(world_template_id, executor_handle)?;
        Ok(factory)
    }

    pub fn initialize(
        &mut self,
        world_template_id: TemplateId,
        executor_handle: InstanceHandle,
    ) -> Result<(), FactoryError> {
        self.config.initialize(world_template_id, executor_handle)?;
        tracing::info!(%world_template_id, %executor_handle, "factory initialized");
        Ok(())
    }

    pub fn settings(&self) -> &FactorySettings {
        &self.settings
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Result<FactoryConfig, FactoryError> {
        self.config.get()
    }

    // --- Admin ---

    pub fn executor(&self) -> Result<InstanceHandle, FactoryError> {
        self.config.get_executor()
    }

    pub fn world_template(&self) -> Result<TemplateId, FactoryError> {
        self.config.get_world_template()
    }

    /// Affects only worlds spawned after this call.
    pub fn set_executor(&mut self, executor_handle: InstanceHandle) -> Result<(), FactoryError> {
        self.config.set_executor(executor_handle)?;
        tracing::info!(%executor_handle, "executor updated");
        Ok(())
    }

    /// Affects only worlds spawned after this call.
    pub fn set_world_template(&mut self, world_template_id: TemplateId) -> Result<(), FactoryError> {
        self.config.set_world_template(world_template_id)?;
        tracing::info!(%world_template_id, "world template updated");
        Ok(())
    }

    // --- Notifications ---

    /// Delivered notifications, oldest first.
    pub fn events(&self) -> &[FactoryEvent] {
        &self.event_log
    }

    /// Drain and return delivered notifications.
    pub fn drain_events(&mut self) -> Vec<FactoryEvent> {
        std::mem::take(&mut self.event_log)
    }

    // --- Deployment ---

    /// Deploy a bare world with no registrations and deliver its `WorldCreated`.
    pub fn deploy<D>(&mut self, deployer: &mut D, name: &str) -> Result<InstanceHandle, SpawnError>
    where
        D: Deployer + ?Sized,
    {
        let config = self.config.get()?;
        let mut journal = SpawnJournal::new();
        let handle = deploy_world(deployer, &config, name, &mut journal)?;
        self.event_log.extend(journal.commit());
        Ok(handle)
    }

    /// Deploy a world and register every requested module, metered by the
    /// factory's [`MeteringPolicy`](crate::MeteringPolicy).
    pub fn spawn<H>(&mut self, host: &mut H, request: &SpawnRequest) -> Result<InstanceHandle, SpawnError>
    where
        H: Deployer + WorldDispatch + ?Sized,
    {
        let meter = self.settings.metering.meter();
        self.spawn_metered(host, request, meter)
    }

    /// [`spawn`](Self::spawn) with a caller-provided meter.
    pub fn spawn_metered<H>(
        &mut self,
        host: &mut H,
        request: &SpawnRequest,
        mut meter: StepMeter,
    ) -> Result<InstanceHandle, SpawnError>
    where
        H: Deployer + WorldDispatch + ?Sized,
    {
        let _span = tracing::info_span!("spawn", name = %request.name).entered();
        let config = self.config.get()?;
        let mut journal = SpawnJournal::new();

        let outcome = deploy_world(host, &config, &request.name, &mut journal).and_then(|world| {
            register_all(
                host,
                world,
                &request.component_ids,
                &request.system_ids,
                &mut meter,
                &mut journal,
            )
            .map_err(SpawnError::RegistrationFailed)?;
            Ok(world)
        });

        match outcome {
            Ok(world) => {
                self.event_log.extend(journal.commit());
                tracing::info!(
                    %world,
                    components = request.component_ids.len(),
                    systems = request.system_ids.len(),
                    steps = meter.spent(),
                    "world spawned"
                );
                Ok(world)
            }
            Err(err) => {
                tracing::warn!(error = %err, effects = journal.effects().len(), "spawn failed, rolling back");
                let failures = journal.unwind(host);
                if failures.is_empty() {
                    Err(err)
                } else {
                    Err(SpawnError::RollbackIncomplete {
                        cause: Box::new(err),
                        failures,
                    })
                }
            }
        }
    }
}

/// Deploy a world from `config` with constructor arguments `[name, executor]`.
/// Records the deployment and stages `WorldCreated` in `journal`.
fn deploy_world<D>(
    deployer: &mut D,
    config: &FactoryConfig,
    name: &str,
    journal: &mut SpawnJournal,
) -> Result<InstanceHandle, SpawnError>
where
    D: Deployer + ?Sized,
{
    let args = [
        ConstructorArg::Name(name.to_string()),
        ConstructorArg::Handle(config.executor_handle),
    ];
    let handle = deployer
        .deploy(config.world_template_id, &args)
        .map_err(SpawnError::DeploymentFailed)?;
    journal.record(Effect::Deployed { handle });
    journal.stage(FactoryEvent::WorldCreated { handle });
    tracing::debug!(%handle, template = %config.world_template_id, "world deployed");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistrationError;
    use crate::meter::MeteringPolicy;
    use crate::registration::ModuleKind;
    use worldforge_kernel::{DeployError, DispatchError, Ledger, Template};

    const WORLD_T: TemplateId = TemplateId(0x420);
    const EXECUTOR: InstanceHandle = InstanceHandle(0x69);

    struct Setup {
        ledger: Ledger,
        factory: WorldFactory,
        foo: TemplateId,
        bar: TemplateId,
    }

    fn setup() -> Setup {
        let mut ledger = Ledger::new();
        ledger.declare_at(WORLD_T, Template::world("world")).unwrap();
        let foo = ledger.declare(Template::component("Foo"));
        let bar = ledger.declare(Template::system("Bar"));
        let factory = WorldFactory::with_config(WORLD_T, EXECUTOR, FactorySettings::default()).unwrap();
        Setup {
            ledger,
            factory,
            foo,
            bar,
        }
    }

    /// Delegates to a ledger but rejects the n-th registration call (1-based).
    struct RejectNth<'a> {
        inner: &'a mut Ledger,
        calls: usize,
        reject_at: usize,
        fail_undeploy: bool,
    }

    impl<'a> RejectNth<'a> {
        fn new(inner: &'a mut Ledger, reject_at: usize) -> Self {
            Self {
                inner,
                calls: 0,
                reject_at,
                fail_undeploy: false,
            }
        }

        fn tick(&mut self, template: TemplateId) -> Result<(), DispatchError> {
            self.calls += 1;
            if self.calls == self.reject_at {
                return Err(DispatchError::UnknownTemplate(template));
            }
            Ok(())
        }
    }

    impl Deployer for RejectNth<'_> {
        fn deploy(
            &mut self,
            template: TemplateId,
            args: &[ConstructorArg],
        ) -> Result<InstanceHandle, DeployError> {
            self.inner.deploy(template, args)
        }

        fn undeploy(&mut self, handle: InstanceHandle) -> Result<(), DeployError> {
            if self.fail_undeploy {
                return Err(DeployError::UnknownInstance(handle));
            }
            self.inner.undeploy(handle)
        }
    }

    impl WorldDispatch for RejectNth<'_> {
        fn register_component(
            &mut self,
            world: InstanceHandle,
            template: TemplateId,
        ) -> Result<(), DispatchError> {
            self.tick(template)?;
            self.inner.register_component(world, template)
        }

        fn register_system(
            &mut self,
            world: InstanceHandle,
            template: TemplateId,
        ) -> Result<(), DispatchError> {
            self.tick(template)?;
            self.inner.register_system(world, template)
        }

        fn unregister_component(
            &mut self,
            world: InstanceHandle,
            template: TemplateId,
        ) -> Result<(), DispatchError> {
            self.inner.unregister_component(world, template)
        }

        fn unregister_system(
            &mut self,
            world: InstanceHandle,
            template: TemplateId,
        ) -> Result<(), DispatchError> {
            self.inner.unregister_system(world, template)
        }

        fn resolve_component(&self, world: InstanceHandle, name: &str) -> Option<TemplateId> {
            self.inner.resolve_component(world, name)
        }

        fn resolve_system(&self, world: InstanceHandle, name: &str) -> Option<TemplateId> {
            self.inner.resolve_system(world, name)
        }
    }

    fn declare_modules(ledger: &mut Ledger, n: usize) -> (Vec<TemplateId>, Vec<TemplateId>) {
        let components = (0..n)
            .map(|i| ledger.declare(Template::component(format!("Comp{i}"))))
            .collect();
        let systems = (0..n)
            .map(|i| ledger.declare(Template::system(format!("Sys{i}"))))
            .collect();
        (components, systems)
    }

    #[test]
    fn scenario_test_world() {
        let mut s = setup();
        assert_eq!(s.factory.world_template().unwrap(), WORLD_T);
        assert_eq!(s.factory.executor().unwrap(), EXECUTOR);

        let request = SpawnRequest::new("TestWorld")
            .with_components([s.foo])
            .with_systems([s.bar]);
        let handle = s.factory.spawn(&mut s.ledger, &request).unwrap();

        assert_eq!(s.ledger.resolve_component(handle, "Foo"), Some(s.foo));
        assert_eq!(s.ledger.resolve_system(handle, "Bar"), Some(s.bar));
        let world = s.ledger.world(handle).unwrap();
        assert_eq!(world.name(), "TestWorld");
        assert_eq!(world.executor(), EXECUTOR);
        assert_eq!(
            s.factory.events(),
            &[FactoryEvent::WorldCreated { handle }]
        );
    }

    #[test]
    fn spawn_before_initialize_fails() {
        let mut ledger = Ledger::new();
        let mut factory = WorldFactory::default();
        let err = factory
            .spawn(&mut ledger, &SpawnRequest::new("W"))
            .unwrap_err();
        assert_eq!(err, SpawnError::Config(FactoryError::NotInitialized));
        assert!(ledger.instances().is_empty());
        assert!(factory.events().is_empty());
        assert_eq!(factory.executor(), Err(FactoryError::NotInitialized));
    }

    #[test]
    fn empty_spawn_creates_bare_world() {
        let mut s = setup();
        let handle = s
            .factory
            .spawn(&mut s.ledger, &SpawnRequest::new("Empty"))
            .unwrap();
        let world = s.ledger.world(handle).unwrap();
        assert!(world.components().is_empty());
        assert!(world.systems().is_empty());
        assert_eq!(s.factory.events().len(), 1);
    }

    #[test]
    fn registration_completeness() {
        let mut s = setup();
        let (components, systems) = declare_modules(&mut s.ledger, 12);
        let request = SpawnRequest::new("Big")
            .with_components(components.iter().copied())
            .with_systems(systems.iter().copied());
        let handle = s.factory.spawn(&mut s.ledger, &request).unwrap();
        for (i, c) in components.iter().enumerate() {
            assert_eq!(s.ledger.resolve_component(handle, &format!("Comp{i}")), Some(*c));
        }
        for (i, sys) in systems.iter().enumerate() {
            assert_eq!(s.ledger.resolve_system(handle, &format!("Sys{i}")), Some(*sys));
        }
    }

    #[test]
    fn admin_changes_only_affect_future_spawns() {
        let mut s = setup();
        let t2 = TemplateId(0x421);
        s.ledger.declare_at(t2, Template::world("world-v2")).unwrap();

        let w1 = s.factory.spawn(&mut s.ledger, &SpawnRequest::new("W1")).unwrap();
        s.factory.set_world_template(t2).unwrap();
        s.factory.set_executor(InstanceHandle(0x70)).unwrap();
        let w2 = s.factory.spawn(&mut s.ledger, &SpawnRequest::new("W2")).unwrap();

        let first = s.ledger.world(w1).unwrap();
        assert_eq!(first.template(), WORLD_T);
        assert_eq!(first.executor(), EXECUTOR);
        let second = s.ledger.world(w2).unwrap();
        assert_eq!(second.template(), t2);
        assert_eq!(second.executor(), InstanceHandle(0x70));
    }

    #[test]
    fn spawns_are_independent() {
        let mut s = setup();
        let a = s
            .factory
            .spawn(&mut s.ledger, &SpawnRequest::new("A").with_components([s.foo]))
            .unwrap();
        let b = s
            .factory
            .spawn(&mut s.ledger, &SpawnRequest::new("B").with_systems([s.bar]))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(s.ledger.resolve_component(a, "Foo"), Some(s.foo));
        assert_eq!(s.ledger.resolve_system(a, "Bar"), None);
        assert_eq!(s.ledger.resolve_component(b, "Foo"), None);
        assert_eq!(s.ledger.resolve_system(b, "Bar"), Some(s.bar));
        assert_eq!(s.factory.drain_events().len(), 2);
        assert!(s.factory.events().is_empty());
    }

    #[test]
    fn deployment_failure_leaves_no_trace() {
        let mut s = setup();
        s.factory.set_world_template(TemplateId(0xdead)).unwrap();
        let err = s
            .factory
            .spawn(&mut s.ledger, &SpawnRequest::new("W").with_components([s.foo]))
            .unwrap_err();
        assert_eq!(
            err,
            SpawnError::DeploymentFailed(DeployError::UnknownTemplate(TemplateId(0xdead)))
        );
        assert!(s.ledger.instances().is_empty());
        assert!(s.factory.events().is_empty());
    }

    #[test]
    fn budget_failure_at_every_position_rolls_back() {
        let mut s = setup();
        let (components, systems) = declare_modules(&mut s.ledger, 3);
        let request = SpawnRequest::new("W")
            .with_components(components.iter().copied())
            .with_systems(systems.iter().copied());
        let total = components.len() + systems.len();

        for k in 1..=total {
            let config_before = s.factory.config().unwrap();
            // Budget covers k - 1 registrations, so the k-th is refused.
            let meter = StepMeter::steps((k - 1) as u64);
            let err = s
                .factory
                .spawn_metered(&mut s.ledger, &request, meter)
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    SpawnError::RegistrationFailed(RegistrationError::OutOfBudget { .. })
                ),
                "k={k}: {err:?}"
            );
            assert_eq!(s.ledger.world_count(), 0, "k={k}");
            assert!(s.factory.events().is_empty(), "k={k}");
            assert_eq!(s.factory.config().unwrap(), config_before);
        }
    }

    #[test]
    fn rejection_at_kth_item_rolls_back() {
        let mut s = setup();
        let (components, systems) = declare_modules(&mut s.ledger, 2);
        let request = SpawnRequest::new("W")
            .with_components(components.iter().copied())
            .with_systems(systems.iter().copied());

        for k in 1..=4 {
            let mut host = RejectNth::new(&mut s.ledger, k);
            let err = s.factory.spawn(&mut host, &request).unwrap_err();
            let expected_kind = if k <= 2 {
                ModuleKind::Component
            } else {
                ModuleKind::System
            };
            match err {
                SpawnError::RegistrationFailed(RegistrationError::RegistrationRejected {
                    kind,
                    index,
                    ..
                }) => {
                    assert_eq!(kind, expected_kind);
                    assert_eq!(index, (k - 1) % 2);
                }
                other => panic!("k={k}: unexpected {other:?}"),
            }
            assert_eq!(s.ledger.world_count(), 0);
            assert!(s.factory.events().is_empty());
        }

        // The same request goes through once nothing is rejected.
        let handle = s.factory.spawn(&mut s.ledger, &request).unwrap();
        assert_eq!(s.ledger.resolve_system(handle, "Sys1"), Some(systems[1]));
    }

    #[test]
    fn duplicate_module_rejected_and_rolled_back() {
        let mut s = setup();
        let request = SpawnRequest::new("W").with_components([s.foo, s.foo]);
        let err = s.factory.spawn(&mut s.ledger, &request).unwrap_err();
        assert!(matches!(
            err,
            SpawnError::RegistrationFailed(RegistrationError::RegistrationRejected {
                source: DispatchError::DuplicateName { .. },
                ..
            })
        ));
        assert_eq!(s.ledger.world_count(), 0);
    }

    #[test]
    fn failed_compensation_is_reported() {
        let mut s = setup();
        let request = SpawnRequest::new("W").with_components([s.foo]).with_systems([s.bar]);
        let mut host = RejectNth::new(&mut s.ledger, 2);
        host.fail_undeploy = true;
        let err = s.factory.spawn(&mut host, &request).unwrap_err();
        match &err {
            SpawnError::RollbackIncomplete { failures, .. } => {
                assert_eq!(failures.len(), 1);
                assert!(matches!(failures[0].effect, Effect::Deployed { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            err.root_cause(),
            SpawnError::RegistrationFailed(RegistrationError::RegistrationRejected { .. })
        ));
        assert!(s.factory.events().is_empty());
    }

    #[test]
    fn unmetered_policy_ignores_budget() {
        let mut ledger = Ledger::new();
        ledger.declare_at(WORLD_T, Template::world("world")).unwrap();
        let (components, _) = declare_modules(&mut ledger, 5);
        let settings = FactorySettings {
            metering: MeteringPolicy::Unmetered,
        };
        let mut factory = WorldFactory::with_config(WORLD_T, EXECUTOR, settings).unwrap();
        let request = SpawnRequest::new("W").with_components(components);
        assert!(factory.spawn(&mut ledger, &request).is_ok());
    }

    #[test]
    fn metered_policy_limits_spawn() {
        let mut ledger = Ledger::new();
        ledger.declare_at(WORLD_T, Template::world("world")).unwrap();
        let (components, _) = declare_modules(&mut ledger, 5);
        let settings = FactorySettings {
            metering: MeteringPolicy::Metered {
                step_limit: 8,
                cost_per_registration: 2,
            },
        };
        let mut factory = WorldFactory::with_config(WORLD_T, EXECUTOR, settings).unwrap();
        let request = SpawnRequest::new("W").with_components(components);
        let err = factory.spawn(&mut ledger, &request).unwrap_err();
        assert!(matches!(
            err,
            SpawnError::RegistrationFailed(RegistrationError::OutOfBudget {
                index: 4,
                needed: 2,
                remaining: 0,
                ..
            })
        ));
        assert_eq!(ledger.world_count(), 0);
    }

    #[test]
    fn standalone_deploy_delivers_notification() {
        let mut s = setup();
        let handle = s.factory.deploy(&mut s.ledger, "Bare").unwrap();
        assert_eq!(s.ledger.world(handle).unwrap().name(), "Bare");
        assert_eq!(s.factory.events(), &[FactoryEvent::WorldCreated { handle }]);
    }

    #[test]
    fn spawn_request_serde() {
        let json = r#"{"name":"W","component_ids":["0x1","0x2"]}"#;
        let request: SpawnRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.component_ids, vec![TemplateId(1), TemplateId(2)]);
        assert!(request.system_ids.is_empty());
    }
}
