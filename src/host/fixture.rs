//! Synthetic host classes for tests, laid out like a recent game version: a record-based skin,
//! a private identifier constructor with a static factory, a supplier-named dynamic texture and
//! the client asset wrapper.

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use once_cell::sync::OnceCell;

use super::{ClassRef, Host, HostClass, InvokeError, ObjectRef, Primitive, TypeRef, Value};

/// Bytes that the fake decoder accepts as an image.
pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Returns `PNG_MAGIC` followed by `body`.
pub fn png(body: &[u8]) -> Vec<u8> {
    let mut bytes = PNG_MAGIC.to_vec();
    bytes.extend_from_slice(body);
    bytes
}

/// Reads field `index` of an object created by `record_class`.
pub fn field_of(target: &Value, index: usize) -> Result<Value, InvokeError> {
    target
        .as_object()
        .and_then(|object| object.state::<Vec<Value>>())
        .and_then(|fields| fields.get(index))
        .cloned()
        .ok_or(InvokeError::BadArguments)
}

/// Builds a record class whose instances keep their fields in a `Vec<Value>`.
pub fn record_class(name: &str, interfaces: &[ClassRef], fields: &[(&str, TypeRef)]) -> ClassRef {
    let this: Arc<OnceCell<ClassRef>> = Arc::new(OnceCell::new());
    let mut builder = HostClass::builder(name);

    for interface in interfaces {
        builder = builder.implements(interface);
    }

    for (index, (field, ty)) in fields.iter().enumerate() {
        builder = builder.component(*field, ty.clone(), move |target| field_of(target, index));
    }

    let params = fields.iter().map(|(_, ty)| ty.clone()).collect();
    let constructed = this.clone();

    let class = builder
        .constructor(params, move |args| {
            let class = constructed.get().ok_or(InvokeError::BadArguments)?;
            Ok(Value::Object(ObjectRef::new(class, args.to_vec())))
        })
        .build();

    let _ = this.set(class.clone());
    class
}

/// Creates an instance of a `record_class` class without going through its constructor.
pub fn instance(class: &ClassRef, fields: Vec<Value>) -> Value {
    Value::Object(ObjectRef::new(class, fields))
}

/// A fake host that counts what the bridge does to it.
pub struct FakeHost {
    pub image: ClassRef,
    pub abstract_texture: ClassRef,
    pub dynamic_texture: ClassRef,
    pub identifier: ClassRef,
    pub manager_class: ClassRef,
    pub asset_texture: ClassRef,
    pub resource_texture: ClassRef,
    pub skin: ClassRef,
    pub player: ClassRef,

    manager: Value,

    /// Identifier strings in registration order.
    pub registrations: Arc<Mutex<Vec<String>>>,

    pub decodes: Arc<AtomicUsize>,

    /// Whether `client_asset_class` reports the wrapper.
    pub client_assets: bool,
}

impl FakeHost {
    pub fn new() -> FakeHost {
        let image = HostClass::builder("NativeImage").build();
        let abstract_texture = HostClass::builder("AbstractTexture").build();

        let dynamic_texture = {
            let this: Arc<OnceCell<ClassRef>> = Arc::new(OnceCell::new());
            let constructed = this.clone();

            let class = HostClass::builder("DynamicTexture")
                .extends(&abstract_texture)
                .constructor(
                    vec![TypeRef::Supplier, (&image).into()],
                    move |args| {
                        let class = constructed.get().ok_or(InvokeError::BadArguments)?;
                        let name = args[0].as_str().unwrap_or_default().to_string();
                        Ok(Value::Object(ObjectRef::new(class, name)))
                    },
                )
                .build();

            let _ = this.set(class.clone());
            class
        };

        let identifier = {
            let this: Arc<OnceCell<ClassRef>> = Arc::new(OnceCell::new());
            let constructed = this.clone();

            let class = HostClass::builder("ResourceLocation")
                // Private on recent versions.
                .constructor(vec![TypeRef::Str, TypeRef::Str], |_| {
                    Err(InvokeError::AccessDenied("private constructor".into()))
                })
                .static_method(
                    "fromNamespaceAndPath",
                    vec![TypeRef::Str, TypeRef::Str],
                    Some(TypeRef::SelfType),
                    move |args| {
                        let class = constructed.get().ok_or(InvokeError::BadArguments)?;
                        let (namespace, path) = match args {
                            [Value::Str(namespace), Value::Str(path)] => (namespace, path),
                            _ => return Err(InvokeError::BadArguments),
                        };

                        Ok(Value::Object(ObjectRef::new(
                            class,
                            format!("{namespace}:{path}"),
                        )))
                    },
                )
                .build();

            let _ = this.set(class.clone());
            class
        };

        let registrations = Arc::new(Mutex::new(vec![]));
        let registered = registrations.clone();

        let manager_class = HostClass::builder("TextureManager")
            .method(
                "release",
                vec![(&identifier).into()],
                None,
                |_, _| Ok(Value::Null),
            )
            .method(
                "register",
                vec![(&identifier).into(), (&abstract_texture).into()],
                None,
                move |_, args| {
                    let id = args[0]
                        .as_object()
                        .and_then(|object| object.state::<String>())
                        .ok_or(InvokeError::BadArguments)?;

                    registered
                        .lock()
                        .map_err(|_| InvokeError::Threw("poisoned".into()))?
                        .push(id.clone());

                    Ok(Value::Null)
                },
            )
            .build();

        let manager = Value::Object(ObjectRef::new(&manager_class, ()));

        let asset_texture = HostClass::builder("ClientAsset$Texture").build();
        let resource_texture = record_class(
            "ClientAsset$ResourceTexture",
            &[asset_texture.clone()],
            &[
                ("id", (&identifier).into()),
                ("texturePath", (&identifier).into()),
            ],
        );

        let skin = record_class(
            "PlayerSkin",
            &[],
            &[
                ("body", (&asset_texture).into()),
                ("cape", (&asset_texture).into()),
                ("elytra", (&asset_texture).into()),
                ("model", TypeRef::Str),
                ("secure", TypeRef::Primitive(Primitive::Boolean)),
            ],
        );

        let profile = HostClass::builder("GameProfile")
            .method("getId", vec![], Some(TypeRef::Uuid), |target, _| {
                field_of(target, 0)
            })
            .build();

        let player = HostClass::builder("PlayerInfo")
            .method("getProfile", vec![], Some((&profile).into()), |target, _| {
                field_of(target, 0)
            })
            .build();

        FakeHost {
            image,
            abstract_texture,
            dynamic_texture,
            identifier,
            manager_class,
            asset_texture,
            resource_texture,
            skin,
            player,
            manager,
            registrations,
            decodes: Arc::new(AtomicUsize::new(0)),
            client_assets: true,
        }
    }

    /// Creates a player whose profile carries `uuid`.
    pub fn player_with(&self, uuid: uuid::Uuid) -> Value {
        let profile_class = self.player.methods()[0]
            .returns()
            .and_then(TypeRef::class)
            .cloned();

        match profile_class {
            Some(profile_class) => {
                let profile = instance(&profile_class, vec![Value::Uuid(uuid)]);
                instance(&self.player, vec![profile])
            }

            None => Value::Null,
        }
    }

    /// Creates a default skin whose texture slots hold resource textures named after the slot.
    pub fn default_skin(&self) -> Value {
        let texture = |name: &str| {
            let id = Value::Object(ObjectRef::new(&self.identifier, format!("minecraft:{name}")));
            instance(&self.resource_texture, vec![id.clone(), id])
        };

        instance(
            &self.skin,
            vec![
                texture("skins/steve"),
                texture("capes/migrator"),
                Value::Null,
                Value::str("wide"),
                Value::bool(true),
            ],
        )
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl Host for FakeHost {
    fn decode_image(&self, bytes: &[u8]) -> Option<Value> {
        self.decodes.fetch_add(1, Ordering::SeqCst);

        if !bytes.starts_with(PNG_MAGIC) {
            return None;
        }

        Some(Value::Object(ObjectRef::new(&self.image, bytes.to_vec())))
    }

    fn texture_manager(&self) -> Option<Value> {
        Some(self.manager.clone())
    }

    fn dynamic_texture_class(&self) -> Option<ClassRef> {
        Some(self.dynamic_texture.clone())
    }

    fn client_asset_class(&self) -> Option<ClassRef> {
        self.client_assets.then(|| self.resource_texture.clone())
    }
}
