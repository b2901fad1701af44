//! Connectivity Statistics (object 7).

use lwm2m_client::{ObjectEnabler, OperationContext};
use lwm2m_proto::{InstanceId, ResourceId, ResponseCode, Value};
use tracing::debug;

/// Connectivity Statistics enabler that refuses every caller.
///
/// The object is advertised so servers can discover it, but no server is
/// authorized to read or drive the counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectivityStatistics;

impl ConnectivityStatistics {
    fn refuse(ctx: &OperationContext<'_>) -> ResponseCode {
        debug!(operation = %ctx.operation, path = %ctx.path, "connectivity statistics refused");
        ResponseCode::Unauthorized
    }
}

impl ObjectEnabler for ConnectivityStatistics {
    fn on_create(
        &self,
        _instance: InstanceId,
        _resource: Option<ResourceId>,
        ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        Self::refuse(ctx)
    }

    fn on_read(
        &self,
        _instance: InstanceId,
        _resource: ResourceId,
        ctx: &OperationContext<'_>,
    ) -> (Value, ResponseCode) {
        (Value::Empty, Self::refuse(ctx))
    }

    fn on_write(
        &self,
        _instance: InstanceId,
        _resource: ResourceId,
        ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        Self::refuse(ctx)
    }

    fn on_delete(&self, _instance: InstanceId, ctx: &OperationContext<'_>) -> ResponseCode {
        Self::refuse(ctx)
    }

    fn on_execute(
        &self,
        _instance: InstanceId,
        _resource: ResourceId,
        ctx: &OperationContext<'_>,
    ) -> ResponseCode {
        Self::refuse(ctx)
    }
}

#[cfg(test)]
mod tests {
    use lwm2m_client::Operation;
    use lwm2m_proto::{Method, ObjectPath, ObjectType, Request};

    use super::*;

    #[test]
    fn every_callback_is_unauthorized() {
        let request = Request::new(Method::Get, "/7/0/2");
        let path = ObjectPath::resource(ObjectType::CONNECTIVITY_STATISTICS, 0, 2);
        let ctx = OperationContext::new(Operation::Read, path, &request);
        let stats = ConnectivityStatistics;

        assert_eq!(stats.on_read(0, 2, &ctx), (Value::Empty, ResponseCode::Unauthorized));
        assert_eq!(stats.on_write(0, 2, &ctx), ResponseCode::Unauthorized);
        assert_eq!(stats.on_execute(0, 6, &ctx), ResponseCode::Unauthorized);
        assert_eq!(stats.on_create(1, None, &ctx), ResponseCode::Unauthorized);
        assert_eq!(stats.on_delete(0, &ctx), ResponseCode::Unauthorized);
    }
}
