//! Cross-reference and schema checks for service entries.

use crate::component::{ObjectCollection, Service};
use crate::error::{ConfigError, ErrorList};
use crate::resolve::Scope;

/// Check every entry of `service`: its executor must exist and its resolved
/// spec must satisfy the executor's schema. All failures are collected.
///
/// Without a scope the executor references are still checked; only spec
/// resolution and the schema check are skipped.
pub(crate) fn validate_service(
    service: &Service,
    objects: &dyn ObjectCollection,
    scope: Option<&Scope<'_>>,
) -> ErrorList {
    let mut errors = ErrorList::new();

    for entry_type in service.entry_types() {
        for entry in service.entries(entry_type) {
            let Some(executor) = objects.get_executor(entry.executor_kind(), entry.executor_name())
            else {
                errors.push(ConfigError::MissingExecutor {
                    kind: entry.executor_kind(),
                    name: entry.executor_name().to_string(),
                    service: service.name().to_string(),
                    origin: service.metadata().clone(),
                });
                continue;
            };

            let Some(scope) = scope else {
                continue;
            };

            let spec = match scope.resolve(service, entry) {
                Ok(spec) => spec,
                Err(e) => {
                    errors.push(ConfigError::Resolution {
                        service: service.identity().display_name(),
                        phase: entry_type.to_string(),
                        index: entry.index(),
                        origin: service.metadata().clone(),
                        source: Box::new(e),
                    });
                    continue;
                }
            };

            for message in executor.check_spec(&spec) {
                errors.push(ConfigError::SchemaViolation {
                    service: service.identity().display_name(),
                    executor: executor.identity().display_name(),
                    message,
                    service_origin: service.metadata().clone(),
                    executor_origin: executor.metadata().clone(),
                });
            }
        }
    }

    errors
}
