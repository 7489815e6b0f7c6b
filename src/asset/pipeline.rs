//! Turns cape bytes into a texture registered with the host.

use thiserror::Error;

use crate::{
    adapter::{
        coerce,
        resolve::invoke_candidates,
        signature::{accepts_value, CapabilityRequest, ParamConstraint, ReturnConstraint},
        CapabilityResolver,
    },
    host::{ClassRef, Host, OpKind, TypeRef, Value},
};

use super::{
    source::CapeSource,
    verify::{decode_signature, SignatureGate, Tier},
};

/// Namespace of the identifier our texture is registered under.
pub const TEXTURE_NAMESPACE: &str = "fishbattery";

/// Path of the identifier our texture is registered under. It never changes, so every
/// registration reuses the same slot in the texture manager.
pub const TEXTURE_PATH: &str = "launcher_cape_dynamic";

/// Name given to the dynamic texture on hosts that want one.
pub const TEXTURE_NAME: &str = "fishbattery_launcher_cape";

/// Factory names tried when no identifier factory can be found by shape.
const IDENTIFIER_FACTORY_NAMES: [&str; 5] =
    ["fromNamespaceAndPath", "of", "tryBuild", "parse", "tryParse"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("couldn't read cape bytes: {0:?}")]
    Read(eyre::Report),

    #[error("signature check failed for {0} cape")]
    SignatureRejected(Tier),

    #[error("cape image couldn't be decoded")]
    Decode,

    #[error("host has no {0}")]
    MissingHostPart(&'static str),

    #[error("no usable {0}")]
    NoCapability(&'static str),

    #[error("texture manager refused the cape texture")]
    Register,
}

impl LoadError {
    /// Returns false for failures where the previous cape must not be shown in its place either.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LoadError::SignatureRejected(_))
    }
}

/// A texture we registered, and the value that render code should be given for it.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisteredTexture {
    identifier: Value,

    /// The client asset wrapper around `identifier` where the host has one, or `identifier`.
    handle: Value,
}

impl RegisteredTexture {
    pub fn new(identifier: Value, handle: Value) -> RegisteredTexture {
        RegisteredTexture { identifier, handle }
    }

    pub fn identifier(&self) -> &Value {
        &self.identifier
    }

    pub fn handle(&self) -> &Value {
        &self.handle
    }
}

/// Something that can turn a source into a registered texture.
pub trait Registrar {
    fn register(&mut self, source: &CapeSource) -> Result<RegisteredTexture, LoadError>;
}

/// Registers capes with a host, checking signatures for gated tiers first.
pub struct TexturePipeline<'a> {
    pub host: &'a dyn Host,
    pub resolver: &'a mut CapabilityResolver,
    pub gate: &'a SignatureGate,
    pub tier: Tier,

    /// Configured signature, base64. Local files may carry their own in a `.sig` file.
    pub signature: Option<&'a str>,
}

impl TexturePipeline<'_> {
    fn signature_for(&self, source: &CapeSource) -> Option<Vec<u8>> {
        if let Some(signature) = self.signature.and_then(decode_signature) {
            return Some(signature);
        }

        let path = source.signature_path()?;

        match std::fs::read_to_string(&path) {
            Ok(text) => decode_signature(&text),
            Err(_) => None,
        }
    }

    fn check_signature(&self, source: &CapeSource, bytes: &[u8]) -> Result<(), LoadError> {
        if !self.tier.is_gated() {
            return Ok(());
        }

        let signature = self.signature_for(source);

        if self.gate.verify(bytes, signature.as_deref()) {
            log::info!("Signature verified for {} cape", self.tier);
            Ok(())
        } else {
            Err(LoadError::SignatureRejected(self.tier))
        }
    }
}

impl Registrar for TexturePipeline<'_> {
    fn register(&mut self, source: &CapeSource) -> Result<RegisteredTexture, LoadError> {
        let bytes = source.read().map_err(LoadError::Read)?;
        self.check_signature(source, &bytes)?;

        let image = self.host.decode_image(&bytes).ok_or(LoadError::Decode)?;

        let manager = self
            .host
            .texture_manager()
            .ok_or(LoadError::MissingHostPart("texture manager"))?;

        let texture_class = self
            .host
            .dynamic_texture_class()
            .ok_or(LoadError::MissingHostPart("dynamic texture class"))?;

        let texture = new_dynamic_texture(self.resolver, &texture_class, &image)
            .ok_or(LoadError::NoCapability("dynamic texture constructor"))?;

        let identifier_class = identifier_class(self.resolver, &manager, &texture)
            .ok_or(LoadError::NoCapability("texture registration method"))?;

        let identifier = mint_identifier(self.resolver, &identifier_class)
            .ok_or(LoadError::NoCapability("identifier factory"))?;

        if !register_texture(self.resolver, &manager, &identifier, &texture) {
            return Err(LoadError::Register);
        }

        let handle = self
            .host
            .client_asset_class()
            .and_then(|class| coerce::wrap(self.resolver, &class, &identifier))
            .unwrap_or_else(|| identifier.clone());

        log::info!(
            "Registered cape texture {:?} from {:?}",
            identifier,
            source.origin()
        );

        Ok(RegisteredTexture::new(identifier, handle))
    }
}

/// Builds the host's mutable texture around `image`. Constructors taking `(image)`,
/// `(name, image)` and `(name supplier, image)` are tried in that order.
fn new_dynamic_texture(
    resolver: &mut CapabilityResolver,
    class: &ClassRef,
    image: &Value,
) -> Option<Value> {
    let wanted: TypeRef = class.into();
    let is_texture = |out: &Value| !out.is_null() && accepts_value(&wanted, out);
    let image_param = ParamConstraint::accepting(image);

    let attempts = [
        (vec![image_param.clone()], vec![image.clone()]),
        (
            vec![ParamConstraint::AcceptsFrom(TypeRef::Str), image_param.clone()],
            vec![Value::str(TEXTURE_NAME), image.clone()],
        ),
        (
            vec![ParamConstraint::AcceptsFrom(TypeRef::Supplier), image_param],
            vec![Value::Supplier(TEXTURE_NAME.to_string()), image.clone()],
        ),
    ];

    attempts.into_iter().find_map(|(params, args)| {
        let request = CapabilityRequest::constructor(params);
        resolver.invoke_until(class, &request, None, &args, is_texture)
    })
}

/// Finds the identifier type the texture manager registers textures under, from the first
/// parameter of its two-argument registration method.
fn identifier_class(
    resolver: &mut CapabilityResolver,
    manager: &Value,
    texture: &Value,
) -> Option<ClassRef> {
    let request = CapabilityRequest::method(
        vec![ParamConstraint::Any, ParamConstraint::accepting(texture)],
        ReturnConstraint::Any,
    );

    resolver
        .candidates(manager.class()?, &request)
        .iter()
        .find_map(|candidate| candidate.params()[0].class().cloned())
}

/// Creates the identifier `fishbattery:launcher_cape_dynamic`. Constructors and factories are
/// found by shape first. Since a namespace/path factory looks the same as any other two-string
/// factory, well-known factory names are tried after that.
fn mint_identifier(resolver: &mut CapabilityResolver, class: &ClassRef) -> Option<Value> {
    let wanted: TypeRef = class.into();
    let is_identifier = |out: &Value| !out.is_null() && accepts_value(&wanted, out);

    let two_strings = vec![ParamConstraint::AcceptsFrom(TypeRef::Str); 2];
    let one_string = vec![ParamConstraint::AcceptsFrom(TypeRef::Str)];

    let split_args = [Value::str(TEXTURE_NAMESPACE), Value::str(TEXTURE_PATH)];
    let joined_args = [Value::str(format!("{TEXTURE_NAMESPACE}:{TEXTURE_PATH}"))];

    let by_shape = [
        (CapabilityRequest::constructor(two_strings.clone()), &split_args[..]),
        (CapabilityRequest::constructor(one_string.clone()), &joined_args[..]),
        (CapabilityRequest::factory(class, two_strings.clone()), &split_args[..]),
        (CapabilityRequest::factory(class, one_string.clone()), &joined_args[..]),
    ];

    for (request, args) in &by_shape {
        if let Some(identifier) = resolver.invoke_until(class, request, None, args, is_identifier) {
            return Some(identifier);
        }
    }

    let by_name = [(two_strings, &split_args[..]), (one_string, &joined_args[..])];

    for (params, args) in by_name {
        let request = CapabilityRequest {
            kind: OpKind::Static,
            params,
            returns: ReturnConstraint::Any,
        };

        let named = resolver.resolve_named(class, &IDENTIFIER_FACTORY_NAMES, &request);

        if let Some(identifier) = invoke_candidates(&named, None, args, is_identifier) {
            log::debug!("Identifier minted through a named factory");
            return Some(identifier);
        }
    }

    None
}

/// Registers `texture` under `identifier` with the first two-argument manager method that takes
/// them and doesn't fail.
fn register_texture(
    resolver: &mut CapabilityResolver,
    manager: &Value,
    identifier: &Value,
    texture: &Value,
) -> bool {
    let Some(manager_class) = manager.class() else {
        return false;
    };

    let request = CapabilityRequest::method(
        vec![
            ParamConstraint::accepting(identifier),
            ParamConstraint::accepting(texture),
        ],
        ReturnConstraint::Any,
    );

    resolver
        .invoke_first(
            manager_class,
            &request,
            Some(manager),
            &[identifier.clone(), texture.clone()],
        )
        .is_some()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::{
        asset::{
            source::Origin,
            verify::tests::{sign, test_gate},
        },
        host::{
            fixture::{field_of, png, FakeHost},
            HostClass, InvokeError, ObjectRef,
        },
    };

    fn pipeline<'a>(
        host: &'a FakeHost,
        resolver: &'a mut CapabilityResolver,
        gate: &'a SignatureGate,
        tier: Tier,
        signature: Option<&'a str>,
    ) -> TexturePipeline<'a> {
        TexturePipeline {
            host,
            resolver,
            gate,
            tier,
            signature,
        }
    }

    fn state_of(value: &Value) -> Option<&String> {
        value.as_object()?.state::<String>()
    }

    #[test]
    fn registers_under_the_fixed_identifier() {
        let host = FakeHost::new();
        let gate = test_gate();
        let mut resolver = CapabilityResolver::new();

        let registered = pipeline(&host, &mut resolver, &gate, Tier::Free, None)
            .register(&CapeSource::from_bytes(png(b"red")))
            .unwrap();

        assert_eq!(
            state_of(registered.identifier()).map(String::as_str),
            Some("fishbattery:launcher_cape_dynamic")
        );
        assert_eq!(
            *host.registrations.lock().unwrap(),
            ["fishbattery:launcher_cape_dynamic"]
        );

        // The handle is the client asset wrapper around the identifier.
        let handle = registered.handle();
        assert_eq!(handle.class().unwrap().name(), "ClientAsset$ResourceTexture");
        assert_eq!(&field_of(handle, 0).unwrap(), registered.identifier());
    }

    #[test]
    fn identifier_is_the_handle_without_client_assets() {
        let mut host = FakeHost::new();
        host.client_assets = false;

        let gate = test_gate();
        let mut resolver = CapabilityResolver::new();

        let registered = pipeline(&host, &mut resolver, &gate, Tier::Free, None)
            .register(&CapeSource::from_bytes(png(b"red")))
            .unwrap();

        assert_eq!(registered.handle(), registered.identifier());
    }

    #[test]
    fn undecodable_bytes_register_nothing() {
        let host = FakeHost::new();
        let gate = test_gate();
        let mut resolver = CapabilityResolver::new();

        let result = pipeline(&host, &mut resolver, &gate, Tier::Free, None)
            .register(&CapeSource::from_bytes(b"not an image".to_vec()));

        assert!(matches!(result, Err(LoadError::Decode)));
        assert_eq!(host.registration_count(), 0);
    }

    #[test]
    fn gated_tiers_need_a_valid_signature() {
        let host = FakeHost::new();
        let gate = test_gate();
        let mut resolver = CapabilityResolver::new();

        let bytes = png(b"founder cape");
        let source = CapeSource::from_bytes(bytes.clone());

        let unsigned = pipeline(&host, &mut resolver, &gate, Tier::Founder, None).register(&source);
        assert!(matches!(
            unsigned,
            Err(LoadError::SignatureRejected(Tier::Founder))
        ));
        assert!(!unsigned.unwrap_err().is_recoverable());

        // Rejected before the image is even decoded.
        assert_eq!(host.decode_count(), 0);
        assert_eq!(host.registration_count(), 0);

        let signature = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            sign(&bytes),
        );

        pipeline(&host, &mut resolver, &gate, Tier::Founder, Some(&signature))
            .register(&source)
            .unwrap();

        assert_eq!(host.registration_count(), 1);
    }

    #[test]
    fn local_capes_can_carry_a_signature_file() {
        let host = FakeHost::new();
        let gate = test_gate();
        let mut resolver = CapabilityResolver::new();

        let bytes = png(b"premium cape");

        let mut cape = NamedTempFile::new().unwrap();
        cape.write_all(&bytes).unwrap();

        let source = CapeSource::new("path:test:0", Origin::File(cape.path().to_path_buf()));

        let signature_path = source.signature_path().unwrap();
        std::fs::write(
            &signature_path,
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, sign(&bytes)),
        )
        .unwrap();

        let result = pipeline(&host, &mut resolver, &gate, Tier::Premium, None).register(&source);
        std::fs::remove_file(&signature_path).unwrap();

        assert!(result.is_ok());
    }

    #[test]
    fn identifiers_fall_back_to_named_factories() {
        let this: std::sync::Arc<once_cell::sync::OnceCell<ClassRef>> = Default::default();
        let constructed = this.clone();

        // `tryParse` is declared to return a wrapper, so only the name finds it.
        let optional = HostClass::builder("Optional").build();
        let identifier = HostClass::builder("Identifier")
            .static_method(
                "tryParse",
                vec![TypeRef::Str],
                Some((&optional).into()),
                move |args| {
                    let class = constructed.get().ok_or(InvokeError::BadArguments)?;
                    let text = args[0].as_str().ok_or(InvokeError::BadArguments)?;
                    Ok(Value::Object(ObjectRef::new(class, text.to_string())))
                },
            )
            .build();
        let _ = this.set(identifier.clone());

        let minted = mint_identifier(&mut CapabilityResolver::new(), &identifier).unwrap();
        assert_eq!(
            state_of(&minted).map(String::as_str),
            Some("fishbattery:launcher_cape_dynamic")
        );
    }

    #[test]
    fn dynamic_textures_are_built_with_a_name_supplier() {
        let host = FakeHost::new();
        let image = host.decode_image(&png(b"cape")).unwrap();

        let texture =
            new_dynamic_texture(&mut CapabilityResolver::new(), &host.dynamic_texture, &image)
                .unwrap();

        assert_eq!(state_of(&texture).map(String::as_str), Some(TEXTURE_NAME));
    }
}
