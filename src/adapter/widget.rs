//! Creates buttons and adds them to host screens without knowing which widget API the host has.

use crate::host::{ClassRef, Primitive, TypeRef, Value};

use super::{
    resolve::{invoke_candidates, CapabilityResolver},
    signature::{accepts_value, CapabilityRequest, ParamConstraint, ReturnConstraint},
};

/// Position and size of a widget, in screen units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    fn args(self) -> [Value; 4] {
        [
            Value::int(self.x),
            Value::int(self.y),
            Value::int(self.width),
            Value::int(self.height),
        ]
    }
}

fn int_params() -> Vec<ParamConstraint> {
    vec![ParamConstraint::Exact(TypeRef::Primitive(Primitive::Int)); 4]
}

/// Adds `widget` to `screen`. Adders returning something related to the widget (the widget
/// itself, or a builder-style return) are tried before any other one-argument adder.
pub fn add_widget(resolver: &mut CapabilityResolver, screen: &Value, widget: &Value) -> bool {
    let (Some(screen_class), Some(widget_type)) = (screen.class(), widget.runtime_type()) else {
        return false;
    };

    let request = CapabilityRequest::method(
        vec![ParamConstraint::AcceptsFrom(widget_type.clone())],
        ReturnConstraint::Prefer(widget_type),
    );

    let added = resolver
        .invoke_first(screen_class, &request, Some(screen), &[widget.clone()])
        .is_some();

    if !added {
        log::warn!("No way to add widgets to {}", screen_class.name());
    }

    added
}

/// Calls whichever four-int method `builder` has for setting bounds. The result must be nothing,
/// the builder itself, or something the builder's class accepts.
pub fn apply_bounds(resolver: &mut CapabilityResolver, builder: &Value, bounds: Bounds) -> bool {
    let Some(builder_class) = builder.class() else {
        return false;
    };

    let request = CapabilityRequest::method(int_params(), ReturnConstraint::Any);
    let builder_type: TypeRef = builder_class.into();

    resolver
        .invoke_until(
            builder_class,
            &request,
            Some(builder),
            &bounds.args(),
            |out| out.is_null() || out == builder || accepts_value(&builder_type, out),
        )
        .is_some()
}

/// Creates a button, using a static builder factory where the host has one and falling back to
/// the old positional constructor.
pub fn create_button(
    resolver: &mut CapabilityResolver,
    button_class: &ClassRef,
    label: &Value,
    on_press: &Value,
    bounds: Bounds,
) -> Option<Value> {
    let button_type: TypeRef = button_class.into();
    let is_button = |out: &Value| !out.is_null() && accepts_value(&button_type, out);

    let factory_request = CapabilityRequest {
        kind: crate::host::OpKind::Static,
        params: vec![
            ParamConstraint::accepting(label),
            ParamConstraint::accepting(on_press),
        ],
        returns: ReturnConstraint::NonVoid,
    };

    let factories = resolver.candidates(button_class, &factory_request);

    for factory in factories {
        let builder = match factory.invoke(None, &[label.clone(), on_press.clone()]) {
            Ok(builder) if !builder.is_null() => builder,
            _ => continue,
        };

        let Some(builder_class) = builder.class().cloned() else {
            continue;
        };

        if !apply_bounds(resolver, &builder, bounds) {
            continue;
        }

        let build_request =
            CapabilityRequest::method(vec![], ReturnConstraint::Related(button_type.clone()));
        let builds = resolver.candidates(&builder_class, &build_request);

        if let Some(button) = invoke_candidates(&builds, Some(&builder), &[], is_button) {
            return Some(button);
        }
    }

    // Older hosts take (x, y, width, height, label, onPress, ...) with optional trailing
    // parameters that can be left null.
    for extra in 0..=2 {
        let mut params = int_params();
        params.push(ParamConstraint::accepting(label));
        params.push(ParamConstraint::accepting(on_press));
        params.extend(std::iter::repeat(ParamConstraint::Any).take(extra));

        let mut args = bounds.args().to_vec();
        args.push(label.clone());
        args.push(on_press.clone());
        args.extend(std::iter::repeat(Value::Null).take(extra));

        let request = CapabilityRequest::constructor(params);

        if let Some(button) = resolver.invoke_until(button_class, &request, None, &args, is_button)
        {
            return Some(button);
        }
    }

    log::warn!("Couldn't create a {}", button_class.name());
    None
}
