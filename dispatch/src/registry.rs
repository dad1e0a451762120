use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use codec::{ParamValue, ParameterDescriptor, coerce};
use wire::ServiceContext;

use crate::error::{DispatchError, HandlerError};
use crate::handler::Handler;
use crate::output::MethodOutput;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-method invoker: downcasts the freshly constructed, freshly injected
/// handler and calls its real async method body.
///
/// Grounded on §9's static-implementation note: in place of runtime
/// reflection, each [`MethodDescriptor`] carries one of these closures,
/// generated once per registered method, instead of a reflected call.
pub type Invoke = Arc<
    dyn for<'a> Fn(&'a mut dyn Handler, Vec<ParamValue>) -> BoxFuture<'a, Result<MethodOutput, HandlerError>>
        + Send
        + Sync,
>;

/// One method of a [`RegisteredType`].
pub struct MethodDescriptor {
    pub name: &'static str,
    /// User-supplied parameters only — the leading context parameter is
    /// implicit and never appears here. This resolves §9's Open Question
    /// (i): "expected" in `ArityMismatch` is this list's length.
    pub params: Vec<ParameterDescriptor>,
    pub invoke: Invoke,
}

/// A handler type registered under a string name (§3: "RegisteredType").
pub struct RegisteredType {
    pub constructor: fn() -> Box<dyn Handler>,
    pub methods: HashMap<&'static str, MethodDescriptor>,
}

impl RegisteredType {
    #[must_use]
    pub fn new(constructor: fn() -> Box<dyn Handler>, methods: Vec<MethodDescriptor>) -> Self {
        Self {
            constructor,
            methods: methods.into_iter().map(|m| (m.name, m)).collect(),
        }
    }
}

/// The dynamic RPC dispatcher (§4.A). Written once at process init; read
/// concurrently thereafter with no lock (§5: "RegisteredType map is
/// written only during init and read-only thereafter").
#[derive(Default)]
pub struct Dispatcher {
    types: HashMap<String, RegisteredType>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent per name: re-registration replaces the prior entry.
    pub fn register(&mut self, type_name: impl Into<String>, registered: RegisteredType) {
        self.types.insert(type_name.into(), registered);
    }

    /// Looks up `(typeName, methodName)`, coerces `paramStrings` against the
    /// method's declared parameters, constructs a fresh handler, injects
    /// `ctx`, and invokes.
    pub async fn call(
        &self,
        type_name: &str,
        method_name: &str,
        param_strings: &[String],
        ctx: ServiceContext,
    ) -> Result<MethodOutput, DispatchError> {
        let registered = self
            .types
            .get(type_name)
            .ok_or_else(|| DispatchError::TypeNotRegistered(type_name.to_owned()))?;

        let method = registered
            .methods
            .get(method_name)
            .ok_or_else(|| DispatchError::MethodNotFound {
                type_name: type_name.to_owned(),
                method_name: method_name.to_owned(),
            })?;

        if param_strings.len() != method.params.len() {
            return Err(DispatchError::ArityMismatch {
                expected: method.params.len(),
                got: param_strings.len(),
            });
        }

        let mut values = Vec::with_capacity(method.params.len());
        for (raw, descriptor) in param_strings.iter().zip(&method.params) {
            values.push(coerce(raw, descriptor)?);
        }

        let mut handler = (registered.constructor)();
        handler.set_database(ctx.db().clone());
        handler.set_session(ctx.session().clone());
        handler.set_query_id(ctx.query_id().to_owned());

        (method.invoke)(handler.as_mut(), values).await.map_err(DispatchError::from)
    }
}
