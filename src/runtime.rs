//! The bridge as the host integration sees it. One `CapeRuntime` exists per game process, and
//! every hook goes through it.

use crate::{
    adapter::{coerce, identity::extract_uuid, widget, CapabilityResolver, CompositeRebuilder},
    asset::{source, CapeCache, RegisteredTexture, SignatureGate, TexturePipeline},
    host::{ClassRef, Host, OpKind, TypeRef, Value},
    meta::{
        catalog::{CapeOption, Catalog, SelectionMeta},
        menu::{CapeMenu, MenuAction},
        settings::Settings,
    },
};

/// Zero-argument skin accessors that give the skin's current cape.
const CAPE_ACCESSORS: [&str; 3] = ["cape", "capeTexture", "getCapeTexture"];

pub struct CapeRuntime {
    settings: Settings,
    host: Box<dyn Host>,
    resolver: CapabilityResolver,
    rebuilder: CompositeRebuilder,
    cache: CapeCache,
    gate: SignatureGate,
}

impl CapeRuntime {
    pub fn new(host: Box<dyn Host>, settings: Settings) -> CapeRuntime {
        CapeRuntime::with_gate(host, settings, SignatureGate::embedded())
    }

    pub fn with_gate(host: Box<dyn Host>, settings: Settings, gate: SignatureGate) -> CapeRuntime {
        CapeRuntime {
            settings,
            host,
            resolver: CapabilityResolver::new(),
            rebuilder: CompositeRebuilder::new(),
            cache: CapeCache::new(),
            gate,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns true if capes should be served for `player`. Without a configured player, or
    /// when the value doesn't tell us who it is, they are.
    fn serves(&self, player: &Value) -> bool {
        let Some(wanted) = self.settings.player_uuid() else {
            return true;
        };

        match extract_uuid(player) {
            Some(uuid) => uuid == wanted,
            None => true,
        }
    }

    /// Makes sure the configured cape is registered and returns it.
    ///
    /// When the configured cape can't be loaded, the last cape that could is returned instead,
    /// unless the configured one failed its signature check.
    pub fn reload(&mut self) -> Option<RegisteredTexture> {
        let source = source::resolve(&self.settings.cape_path, &self.settings.cape_url)?;

        let mut pipeline = TexturePipeline {
            host: self.host.as_ref(),
            resolver: &mut self.resolver,
            gate: &self.gate,
            tier: self.settings.tier(),
            signature: self.settings.signature(),
        };

        match self.cache.get_or_register(&source, &mut pipeline) {
            Ok(texture) => Some(texture),

            Err(err) if err.is_recoverable() => {
                log::warn!("Failed to load launcher cape: {err:?}");
                self.cache.current().cloned()
            }

            Err(err) => {
                log::error!("Refusing launcher cape: {err}");
                None
            }
        }
    }

    /// The texture handle render code should use for `player`'s cape, if they get one.
    pub fn cape_texture_for_local_player(&mut self, player: &Value) -> Option<Value> {
        if !self.serves(player) {
            return None;
        }

        self.reload().map(|texture| texture.handle().clone())
    }

    /// Like `cape_texture_for_local_player`, but gives the bare identifier for hosts that render
    /// capes by identifier.
    pub fn cape_texture_id_for_local_player(&mut self, player: &Value) -> Option<Value> {
        if !self.serves(player) {
            return None;
        }

        self.reload().map(|texture| texture.identifier().clone())
    }

    /// Reads `skin`'s current cape through one of the well-known accessors.
    fn current_cape(skin: &Value) -> Option<Value> {
        let class = skin.class()?;

        CAPE_ACCESSORS
            .iter()
            .flat_map(|name| class.methods_named(name))
            .filter(|accessor| accessor.kind() == OpKind::Instance && accessor.params().is_empty())
            .find_map(|accessor| accessor.invoke(Some(skin), &[]).ok())
            .filter(|cape| !cape.is_null())
    }

    /// Returns a copy of `skin` wearing `cape`, or `None` if the skin can't be rebuilt.
    pub fn replace_cape_on_skin(&mut self, skin: &Value, cape: &Value) -> Option<Value> {
        if skin.is_null() || cape.is_null() {
            return None;
        }

        let wrappers: Vec<ClassRef> = self.host.client_asset_class().into_iter().collect();

        // Dress the replacement like the cape it's replacing, so that it lands in the same slot.
        let replacement = CapeRuntime::current_cape(skin)
            .and_then(|current| current.class().cloned())
            .and_then(|class| {
                coerce::coerce(&mut self.resolver, &TypeRef::Class(class), cape, &wrappers)
            })
            .unwrap_or_else(|| cape.clone());

        self.rebuilder
            .rebuild_with_replacement(&mut self.resolver, skin, &replacement, &wrappers)
    }

    fn catalog(&self) -> Catalog {
        Catalog::new(self.settings.catalog_path())
    }

    pub fn selectable_capes(&self) -> Vec<CapeOption> {
        self.catalog().options()
    }

    pub fn selected_cape_id(&self) -> &str {
        &self.settings.cape_id
    }

    fn save_selection(&self, option: Option<&CapeOption>) {
        let id = option.map(|option| option.id.as_str()).unwrap_or_default();
        self.catalog().save_selected(id);

        if let Some(meta_path) = &self.settings.meta_path {
            SelectionMeta::now(option).write(meta_path);
        }
    }

    /// Selects the catalog cape with the given id, or clears the selection if `id` is blank.
    /// Returns false if there is no such cape, in which case nothing changes.
    pub fn select_cape_by_id(&mut self, id: &str) -> bool {
        let id = id.trim();

        if id.is_empty() {
            log::info!("Clearing cape selection");

            self.settings.clear_selection();
            self.cache.invalidate();
            self.save_selection(None);

            return true;
        }

        let Some(option) = self.catalog().find(id) else {
            log::warn!("No cape {:?} in the catalog", id);
            return false;
        };

        log::info!("Selecting cape {:?} ({})", option.id, option.tier());

        self.settings.cape_path = option.full_path.clone();
        self.settings.cape_url = option.cloud_url.clone();
        self.settings.cape_id = option.id.clone();
        self.settings.tier = option.tier.clone();
        self.settings.signature = option.signature.clone();

        self.cache.invalidate();

        if self.reload().is_none() {
            log::warn!("Selected cape {:?} couldn't be loaded yet", option.id);
        }

        self.save_selection(Some(&option));
        true
    }

    /// The cape picker at `page`.
    pub fn menu(&self, page: usize) -> CapeMenu {
        CapeMenu::new(self.selectable_capes(), &self.settings.cape_id, page)
    }

    /// Adds the picker's buttons for `page` to `screen`. `label` turns button text into whatever
    /// the host's buttons display, and `on_press` gives the callback for an action. Returns the
    /// number of buttons added.
    pub fn populate_menu(
        &mut self,
        screen: &Value,
        button_class: &ClassRef,
        page: usize,
        (width, height): (i32, i32),
        label: impl Fn(&str) -> Value,
        on_press: impl Fn(&MenuAction) -> Value,
    ) -> usize {
        let buttons = self.menu(page).layout(width, height);
        let mut added = 0;

        for button in buttons {
            let created = widget::create_button(
                &mut self.resolver,
                button_class,
                &label(&button.label),
                &on_press(&button.action),
                button.bounds,
            );

            if let Some(created) = created {
                if widget::add_widget(&mut self.resolver, screen, &created) {
                    added += 1;
                }
            }
        }

        added
    }

    /// Carries out a picker action. Returns the page the picker should show next, or `None` if
    /// it should close.
    pub fn press(&mut self, action: &MenuAction, page: usize) -> Option<usize> {
        match action {
            MenuAction::Clear => {
                self.select_cape_by_id("");
                Some(page)
            }

            MenuAction::Select(id) => {
                self.select_cape_by_id(id);
                Some(page)
            }

            MenuAction::Page(page) => Some(*page),
            MenuAction::Done => None,
        }
    }
}
