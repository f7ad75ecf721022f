use std::fmt;
use worldforge_common::{InstanceHandle, TemplateId};
use worldforge_kernel::WorldDispatch;

use crate::error::RegistrationError;
use crate::journal::{Effect, SpawnJournal};
use crate::meter::StepMeter;

/// Which registry a module goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Component,
    System,
}

impl ModuleKind {
    fn effect(self, world: InstanceHandle, template: TemplateId) -> Effect {
        match self {
            Self::Component => Effect::ComponentRegistered { world, template },
            Self::System => Effect::SystemRegistered { world, template },
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component => f.write_str("component"),
            Self::System => f.write_str("system"),
        }
    }
}

/// Register every component, then every system, into `world`.
///
/// Each registration is charged against `meter` before it is dispatched, and
/// recorded in `journal` once it succeeds. The first failure aborts the whole
/// operation; the caller owns the journal and decides whether to unwind it.
pub fn register_all<D>(
    dispatch: &mut D,
    world: InstanceHandle,
    components: &[TemplateId],
    systems: &[TemplateId],
    meter: &mut StepMeter,
    journal: &mut SpawnJournal,
) -> Result<(), RegistrationError>
where
    D: WorldDispatch + ?Sized,
{
    register_pass(dispatch, world, ModuleKind::Component, components, meter, journal)?;
    register_pass(dispatch, world, ModuleKind::System, systems, meter, journal)
}

fn register_pass<D>(
    dispatch: &mut D,
    world: InstanceHandle,
    kind: ModuleKind,
    templates: &[TemplateId],
    meter: &mut StepMeter,
    journal: &mut SpawnJournal,
) -> Result<(), RegistrationError>
where
    D: WorldDispatch + ?Sized,
{
    for (index, &template) in templates.iter().enumerate() {
        meter
            .charge()
            .map_err(|exhausted| RegistrationError::OutOfBudget {
                kind,
                index,
                template,
                needed: exhausted.needed,
                remaining: exhausted.remaining,
            })?;

        let dispatched = match kind {
            ModuleKind::Component => dispatch.register_component(world, template),
            ModuleKind::System => dispatch.register_system(world, template),
        };
        dispatched.map_err(|source| RegistrationError::RegistrationRejected {
            kind,
            index,
            template,
            source,
        })?;

        journal.record(kind.effect(world, template));
        tracing::debug!(%world, %kind, %template, index, "registered");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldforge_common::ConstructorArg;
    use worldforge_kernel::{Deployer, DispatchError, Ledger, Template};

    struct Fixture {
        ledger: Ledger,
        world: InstanceHandle,
        components: Vec<TemplateId>,
        systems: Vec<TemplateId>,
    }

    fn fixture(n_components: usize, n_systems: usize) -> Fixture {
        let mut ledger = Ledger::new();
        let world_t = ledger.declare(Template::world("world"));
        let components = (0..n_components)
            .map(|i| ledger.declare(Template::component(format!("C{i}"))))
            .collect();
        let systems = (0..n_systems)
            .map(|i| ledger.declare(Template::system(format!("S{i}"))))
            .collect();
        let world = ledger
            .deploy(
                world_t,
                &[
                    ConstructorArg::Name("W".into()),
                    ConstructorArg::Handle(InstanceHandle(0x69)),
                ],
            )
            .unwrap();
        Fixture {
            ledger,
            world,
            components,
            systems,
        }
    }

    #[test]
    fn registers_everything_in_order() {
        let mut f = fixture(3, 2);
        let mut meter = StepMeter::unmetered();
        let mut journal = SpawnJournal::new();
        register_all(
            &mut f.ledger,
            f.world,
            &f.components,
            &f.systems,
            &mut meter,
            &mut journal,
        )
        .unwrap();

        assert_eq!(meter.spent(), 5);
        assert_eq!(journal.effects().len(), 5);
        assert_eq!(
            journal.effects()[0],
            Effect::ComponentRegistered {
                world: f.world,
                template: f.components[0]
            }
        );
        assert_eq!(
            journal.effects()[4],
            Effect::SystemRegistered {
                world: f.world,
                template: f.systems[1]
            }
        );
        for (i, c) in f.components.iter().enumerate() {
            assert_eq!(
                f.ledger.resolve_component(f.world, &format!("C{i}")),
                Some(*c)
            );
        }
    }

    #[test]
    fn empty_lists_succeed_without_charging() {
        let mut f = fixture(0, 0);
        let mut meter = StepMeter::steps(0);
        let mut journal = SpawnJournal::new();
        register_all(&mut f.ledger, f.world, &[], &[], &mut meter, &mut journal).unwrap();
        assert_eq!(meter.spent(), 0);
        assert!(journal.effects().is_empty());
    }

    #[test]
    fn budget_exhaustion_stops_before_dispatch() {
        let mut f = fixture(2, 2);
        // Enough for both components and the first system only.
        let mut meter = StepMeter::steps(3);
        let mut journal = SpawnJournal::new();
        let err = register_all(
            &mut f.ledger,
            f.world,
            &f.components,
            &f.systems,
            &mut meter,
            &mut journal,
        )
        .unwrap_err();

        assert_eq!(
            err,
            RegistrationError::OutOfBudget {
                kind: ModuleKind::System,
                index: 1,
                template: f.systems[1],
                needed: 1,
                remaining: 0,
            }
        );
        assert_eq!(journal.effects().len(), 3);
        assert_eq!(f.ledger.resolve_system(f.world, "S1"), None);
    }

    #[test]
    fn rejection_aborts_remaining_items() {
        let mut f = fixture(1, 1);
        let dup = f.components[0];
        let components = vec![dup, dup];
        let mut meter = StepMeter::unmetered();
        let mut journal = SpawnJournal::new();
        let err = register_all(
            &mut f.ledger,
            f.world,
            &components,
            &f.systems,
            &mut meter,
            &mut journal,
        )
        .unwrap_err();

        match err {
            RegistrationError::RegistrationRejected {
                kind,
                index,
                source,
                ..
            } => {
                assert_eq!(kind, ModuleKind::Component);
                assert_eq!(index, 1);
                assert!(matches!(source, DispatchError::DuplicateName { .. }));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        // The system pass never ran.
        assert_eq!(f.ledger.resolve_system(f.world, "S0"), None);
        assert_eq!(journal.effects().len(), 1);
    }

    #[test]
    fn module_kind_display() {
        assert_eq!(ModuleKind::Component.to_string(), "component");
        assert_eq!(ModuleKind::System.to_string(), "system");
    }
}
