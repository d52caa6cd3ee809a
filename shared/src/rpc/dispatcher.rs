use std::{
    any::{type_name, TypeId},
    collections::HashMap,
};

use log::warn;

use skein_serde::ByteReader;

use crate::{
    codec::codec_registry::CodecRegistry,
    component::replicate::Replicated,
    entity::replicated_entity::ReplicatedEntity,
    error::{CodecError, ConfigError},
    rpc::{
        call_record::{RpcCallHeader, RpcKind},
        error::RpcError,
        method_hash::MethodHash,
    },
    types::{EntityId, HostType, PeerId},
};

/// What a registered method is and who may call it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcTarget {
    pub signature: String,
    pub kind: RpcKind,
    /// ServerRpc only: reject callers that do not own the entity
    pub owner_only: bool,
    pub component_name: &'static str,
    pub component_type: TypeId,
}

impl RpcTarget {
    pub fn new<C: Replicated>(signature: &str, kind: RpcKind, owner_only: bool) -> Self {
        Self {
            signature: signature.to_string(),
            kind,
            owner_only,
            component_name: type_name::<C>(),
            component_type: TypeId::of::<C>(),
        }
    }
}

/// Everything an invoker may need besides its component and arguments
pub struct RpcContext<'a> {
    pub codecs: &'a CodecRegistry,
    pub entity: EntityId,
    /// The calling peer, when the call arrived from the network on a server
    pub caller: Option<PeerId>,
}

/// Decodes a call's arguments and runs it against the target component
pub type RpcInvoker = Box<
    dyn FnMut(&mut dyn Replicated, &mut ByteReader, &RpcContext) -> Result<(), CodecError> + Send,
>;

/// The session a call arrived on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallerInfo {
    pub peer: PeerId,
    pub ready: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    UnknownMethod,
    KindMismatch { registered: RpcKind },
    WrongSide,
    CallerNotReady,
    NotOwner,
    EntityNotFound,
    ComponentOutOfRange,
    ComponentMismatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Invoked,
    Dropped(DropReason),
}

struct Registration {
    target: RpcTarget,
    invoker: RpcInvoker,
}

/// Routes inbound calls by method hash to registered invokers after
/// checking the caller's authority. All registration happens during setup.
pub struct RpcDispatcher {
    host: HostType,
    methods: HashMap<MethodHash, Registration>,
}

impl RpcDispatcher {
    pub fn new(host: HostType) -> Self {
        Self {
            host,
            methods: HashMap::new(),
        }
    }

    pub fn host(&self) -> HostType {
        self.host
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn target(&self, hash: &MethodHash) -> Option<&RpcTarget> {
        self.methods.get(hash).map(|registration| &registration.target)
    }

    // Registration

    pub fn register(
        &mut self,
        hash: MethodHash,
        target: RpcTarget,
        invoker: RpcInvoker,
    ) -> Result<(), ConfigError> {
        if let Some(existing) = self.methods.get(&hash) {
            if existing.target.signature == target.signature {
                return Err(ConfigError::DuplicateMethodHash {
                    signature: target.signature,
                    hash: hash.to_u16(),
                });
            }
            return Err(ConfigError::MethodHashCollision {
                signature: target.signature,
                existing: existing.target.signature.clone(),
                hash: hash.to_u16(),
            });
        }
        self.methods.insert(hash, Registration { target, invoker });
        Ok(())
    }

    /// Registers `f` as the body of `signature` on components of type `C`,
    /// hashing the signature to address it
    pub fn register_method<C, F>(
        &mut self,
        signature: &str,
        kind: RpcKind,
        owner_only: bool,
        mut f: F,
    ) -> Result<MethodHash, ConfigError>
    where
        C: Replicated,
        F: FnMut(&mut C, &mut ByteReader, &RpcContext) -> Result<(), CodecError> + Send + 'static,
    {
        let hash = MethodHash::of(signature);
        let target = RpcTarget::new::<C>(signature, kind, owner_only);
        let invoker: RpcInvoker = Box::new(
            move |component: &mut dyn Replicated,
                  reader: &mut ByteReader,
                  context: &RpcContext|
                  -> Result<(), CodecError> {
                let Some(component) = component.as_any_mut().downcast_mut::<C>() else {
                    return Err(CodecError::TypeMismatch {
                        expected: type_name::<C>(),
                    });
                };
                f(component, reader, context)
            },
        );
        self.register(hash, target, invoker)?;
        Ok(hash)
    }

    // Dispatch

    /// Validates and runs one inbound call. `args` must be bounded to the
    /// call's own argument bytes. Authority failures come back as
    /// `Dropped` and are logged; only framing and codec failures are errors.
    pub fn dispatch(
        &mut self,
        codecs: &CodecRegistry,
        entity: Option<&mut ReplicatedEntity>,
        header: &RpcCallHeader,
        args: &mut ByteReader,
        sender: Option<&CallerInfo>,
    ) -> Result<DispatchOutcome, RpcError> {
        let host = self.host;
        let Some(registration) = self.methods.get_mut(&header.hash) else {
            return Ok(drop_call(header, DropReason::UnknownMethod));
        };
        let target = &registration.target;

        if header.kind != target.kind {
            return Ok(drop_call(
                header,
                DropReason::KindMismatch {
                    registered: target.kind,
                },
            ));
        }

        let accepted_here = match header.kind {
            RpcKind::ServerRpc => host == HostType::Server,
            RpcKind::ClientRpc | RpcKind::TargetRpc => host == HostType::Client,
        };
        if !accepted_here {
            return Ok(drop_call(header, DropReason::WrongSide));
        }

        if header.kind == RpcKind::ServerRpc && !sender.map_or(false, |caller| caller.ready) {
            return Ok(drop_call(header, DropReason::CallerNotReady));
        }

        let Some(entity) = entity else {
            return Ok(drop_call(header, DropReason::EntityNotFound));
        };

        if header.kind == RpcKind::ServerRpc && target.owner_only {
            let is_owner = sender.map_or(false, |caller| entity.is_owned_by(&caller.peer));
            if !is_owner {
                return Ok(drop_call(header, DropReason::NotOwner));
            }
        }

        let entity_id = entity.id();
        let Some(component) = entity.component_at_mut(header.component) else {
            return Ok(drop_call(header, DropReason::ComponentOutOfRange));
        };
        if component.as_any().type_id() != target.component_type {
            return Ok(drop_call(header, DropReason::ComponentMismatch));
        }

        let context = RpcContext {
            codecs,
            entity: entity_id,
            caller: sender.map(|caller| caller.peer),
        };
        (registration.invoker)(component, args, &context).map_err(|source| RpcError::Codec {
            hash: header.hash.to_u16(),
            source,
        })?;

        if args.has_remaining() {
            return Err(RpcError::ResidualArguments {
                hash: header.hash.to_u16(),
                remaining: args.remaining(),
            });
        }

        Ok(DispatchOutcome::Invoked)
    }
}

fn drop_call(header: &RpcCallHeader, reason: DropReason) -> DispatchOutcome {
    let detail = match reason {
        DropReason::UnknownMethod => "method is not registered",
        DropReason::KindMismatch { .. } => "call kind does not match the registered method",
        DropReason::WrongSide => "call kind is not accepted on this side",
        DropReason::CallerNotReady => "caller is not ready",
        DropReason::NotOwner => "caller does not own the entity",
        DropReason::EntityNotFound => "entity not found",
        DropReason::ComponentOutOfRange => "component index out of range",
        DropReason::ComponentMismatch => "component is not the method's target type",
    };
    warn!(
        "Dropping {:?} {} on {} component {}: {}",
        header.kind, header.hash, header.entity, header.component, detail
    );
    DispatchOutcome::Dropped(reason)
}
