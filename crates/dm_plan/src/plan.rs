use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec::Vec;

use dm_access::{DataAccessor, DataMutator, MutationError, Path, Resolved, Segment};
use serde_json::{Map, Value};

use crate::class::{ClassInfo, SourceLocation};
use crate::directive::Directive;
use crate::error::PlanError;
use crate::flags::PlanFlags;
use crate::hooks::{FieldHooks, HookError};

// -----------------------------------------------------------------------------
// FieldPlan

/// One field of a [`ConstructionPlan`], with its paths already parsed.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    name: Box<str>,
    read: Path,
    write: Path,
    directives: Box<[Directive]>,
    hidden: bool,
    computed: bool,
}

impl FieldPlan {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where hydration reads the field: its `map_from` path or its name.
    #[inline]
    pub fn read_path(&self) -> &Path {
        &self.read
    }

    /// Where export writes the field: its `map_to` path or its name.
    #[inline]
    pub fn write_path(&self) -> &Path {
        &self.write
    }

    #[inline]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    #[inline]
    pub fn is_computed(&self) -> bool {
        self.computed
    }
}

// -----------------------------------------------------------------------------
// ConstructionPlan

/// The ordered field table of one type, built once from its [`ClassInfo`].
///
/// # Examples
///
/// ```
/// use dm_plan::{ClassInfo, ConstructionPlan, Directive, FieldInfo, NoHooks, PlanFlags};
/// use serde_json::json;
///
/// let info = ClassInfo::new("app::User")
///     .with_field(FieldInfo::new("name").with_directive(Directive::MapFrom("profile.name".into())))
///     .with_field(FieldInfo::new("password").with_directive(Directive::Hidden))
///     .with_field(FieldInfo::new("score").with_directive(Directive::Computed));
/// let plan = ConstructionPlan::build(&info).unwrap();
/// assert_eq!(plan.flags(), PlanFlags::MAPS_FROM | PlanFlags::HIDES | PlanFlags::COMPUTES);
///
/// let source = json!({ "profile": { "name": "Ada" }, "password": "x", "score": 9 });
/// let fields = plan.hydrate(&source, &NoHooks).unwrap();
/// assert_eq!(fields, json!({ "name": "Ada", "password": "x" }));
///
/// let exported = plan.export(fields).unwrap();
/// assert_eq!(exported, json!({ "name": "Ada" }));
/// ```
#[derive(Debug, Clone)]
pub struct ConstructionPlan {
    type_path: &'static str,
    source: Option<SourceLocation>,
    signature: u64,
    fields: Box<[FieldPlan]>,
    flags: PlanFlags,
}

impl ConstructionPlan {
    /// Parses every directive of `info` and computes the plan flags.
    pub fn build(info: &ClassInfo) -> Result<Self, PlanError> {
        let class = info.type_path();
        let mut flags = PlanFlags::empty();
        let mut fields: Vec<FieldPlan> = Vec::with_capacity(info.fields().len());

        for field in info.fields() {
            let name = field.name();
            if fields.iter().any(|planned| planned.name() == name) {
                return Err(PlanError::DuplicateField {
                    class,
                    field: name.into(),
                });
            }

            let parse = |text: &str| {
                Path::parse(text).map_err(|error| PlanError::Path {
                    class,
                    field: name.into(),
                    error,
                })
            };
            let repeated = |directive: &Directive| PlanError::RepeatedDirective {
                class,
                field: name.into(),
                directive: directive.key(),
            };

            let mut read = None;
            let mut write = None;
            let mut hidden = false;
            let mut computed = false;

            for directive in field.directives() {
                match directive {
                    Directive::MapFrom(path) => {
                        if read.is_some() {
                            return Err(repeated(directive));
                        }
                        read = Some(parse(path.as_ref())?);
                        flags |= PlanFlags::MAPS_FROM;
                    }
                    Directive::MapTo(path) => {
                        if write.is_some() {
                            return Err(repeated(directive));
                        }
                        let path = parse(path.as_ref())?;
                        if path.has_wildcard() {
                            return Err(PlanError::WildcardTarget {
                                class,
                                field: name.into(),
                            });
                        }
                        write = Some(path);
                        flags |= PlanFlags::MAPS_TO;
                    }
                    Directive::Hidden => {
                        hidden = true;
                        flags |= PlanFlags::HIDES;
                    }
                    Directive::Computed => {
                        computed = true;
                        flags |= PlanFlags::COMPUTES;
                    }
                    Directive::CastWith(_) => flags |= PlanFlags::CASTS,
                    Directive::ValidationRule(_) => flags |= PlanFlags::VALIDATES,
                }
            }

            let own = || Path::from_segments([Segment::literal(name)]);
            fields.push(FieldPlan {
                name: name.into(),
                read: read.unwrap_or_else(own),
                write: write.unwrap_or_else(own),
                directives: field.directives().into(),
                hidden,
                computed,
            });
        }

        Ok(Self {
            type_path: class,
            source: info.source().cloned(),
            signature: info.signature(),
            fields: fields.into_boxed_slice(),
            flags,
        })
    }

    #[inline]
    pub fn type_path(&self) -> &'static str {
        self.type_path
    }

    /// The file the type was declared in, if known.
    #[inline]
    pub fn source(&self) -> Option<&SourceLocation> {
        self.source.as_ref()
    }

    /// [`ClassInfo::signature`] of the description this plan was built from.
    #[inline]
    pub fn signature(&self) -> u64 {
        self.signature
    }

    #[inline]
    pub fn flags(&self) -> PlanFlags {
        self.flags
    }

    #[inline]
    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldPlan> {
        self.fields.iter().find(|field| field.name() == name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Collects the fields of this type from `source` into an object keyed by
    /// field name.
    ///
    /// Computed fields are skipped and absent fields are left out. A
    /// wildcard `map_from` path reads the list of matched values. Casters
    /// run in declaration order, then validation rules; rules also see
    /// absent fields, as `null`.
    pub fn hydrate(&self, source: &Value, hooks: &dyn FieldHooks) -> Result<Value, HookError> {
        let reader = DataAccessor::new(source);
        let mut object = Map::with_capacity(self.fields.len());
        let readable = self.fields.iter().filter(|field| !field.computed);

        if !self.flags.intersects(PlanFlags::HOOKED) {
            for field in readable {
                if let Some(value) = read(reader, &field.read) {
                    object.insert(field.name.to_string(), value);
                }
            }
            return Ok(Value::Object(object));
        }

        for field in readable {
            let mut value = read(reader, &field.read);
            for directive in field.directives.iter() {
                if let Directive::CastWith(caster) = directive
                    && let Some(current) = value.take()
                {
                    value = Some(hooks.cast(&field.name, caster, current)?);
                }
            }
            for directive in field.directives.iter() {
                if let Directive::ValidationRule(rule) = directive {
                    hooks.validate(&field.name, rule, value.as_ref().unwrap_or(&Value::Null))?;
                }
            }
            if let Some(value) = value {
                object.insert(field.name.to_string(), value);
            }
        }
        Ok(Value::Object(object))
    }

    /// Reshapes a serialized instance for output.
    ///
    /// Hidden fields are dropped and the rest are written to their
    /// `map_to` paths, in plan order. Keys the plan does not know follow
    /// unchanged unless the slot is already taken. Non-objects are returned
    /// as they are.
    pub fn export(&self, value: Value) -> Result<Value, MutationError> {
        let Value::Object(mut object) = value else {
            return Ok(value);
        };
        if !self.flags.intersects(PlanFlags::RESHAPES) {
            return Ok(Value::Object(object));
        }

        let mut out = Value::Object(Map::with_capacity(object.len()));
        let mut writer = DataMutator::new(&mut out);
        for field in self.fields.iter() {
            let Some(value) = object.shift_remove(&*field.name) else {
                continue;
            };
            if !field.hidden {
                writer.set(&field.write, value)?;
            }
        }

        if let Value::Object(map) = &mut out {
            for (key, value) in object {
                map.entry(key).or_insert(value);
            }
        }
        Ok(out)
    }
}

fn read(reader: DataAccessor<'_>, path: &Path) -> Option<Value> {
    match reader.resolve(path) {
        Resolved::Missing => None,
        Resolved::Single(value) => Some(value.clone()),
        Resolved::Wildcard(matches) => Some(Value::Array(matches.values().cloned().collect())),
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use serde_json::{Value, json};

    use super::ConstructionPlan;
    use crate::{ClassInfo, Directive, FieldHooks, FieldInfo, HookError, NoHooks, PlanError};
    use crate::{PlanFlags, ValidationRule};

    fn field(name: &str, directives: &[Directive]) -> FieldInfo {
        directives
            .iter()
            .cloned()
            .fold(FieldInfo::new(name), FieldInfo::with_directive)
    }

    struct Hooks;

    impl FieldHooks for Hooks {
        fn cast(&self, field: &str, caster: &str, value: Value) -> Result<Value, HookError> {
            match (caster, value) {
                ("upper", Value::String(s)) => Ok(Value::String(s.to_uppercase())),
                ("int", Value::String(s)) => s
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| HookError::new(field, "not an integer")),
                (_, value) => Ok(value),
            }
        }

        fn validate(&self, field: &str, rule: &ValidationRule, value: &Value) -> Result<(), HookError> {
            match rule.name() {
                "required" if value.is_null() => Err(HookError::new(field, "is required")),
                "min" => {
                    let min: i64 = rule.args()[0].parse().unwrap();
                    match value.as_i64() {
                        Some(n) if n < min => Err(HookError::new(field, "too small")),
                        _ => Ok(()),
                    }
                }
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn build_rejects_bad_descriptions() {
        let info = ClassInfo::new("T")
            .with_field(field("a", &[]))
            .with_field(field("a", &[]));
        assert_eq!(
            ConstructionPlan::build(&info).unwrap_err(),
            PlanError::DuplicateField { class: "T", field: "a".into() }
        );

        let info = ClassInfo::new("T").with_field(field("a", &[Directive::MapFrom("x..y".into())]));
        assert!(matches!(ConstructionPlan::build(&info), Err(PlanError::Path { .. })));

        let info = ClassInfo::new("T").with_field(field(
            "a",
            &[Directive::MapTo("x".into()), Directive::MapTo("y".into())],
        ));
        assert_eq!(
            ConstructionPlan::build(&info).unwrap_err().to_string(),
            "field `a` of `T` has more than one `map_to`"
        );

        let info = ClassInfo::new("T").with_field(field("a", &[Directive::MapTo("x.*".into())]));
        assert!(matches!(
            ConstructionPlan::build(&info),
            Err(PlanError::WildcardTarget { .. })
        ));
    }

    #[test]
    fn plain_fields_read_by_name() {
        let info = ClassInfo::new("T")
            .with_field(field("a", &[]))
            .with_field(field("b.c", &[]));
        let plan = ConstructionPlan::build(&info).unwrap();
        assert!(plan.flags().is_empty());
        assert_eq!(plan.field("b.c").unwrap().read_path().len(), 1);

        let source = json!({ "a": 1, "b.c": 2, "b": { "c": 3 } });
        assert_eq!(plan.hydrate(&source, &NoHooks).unwrap(), json!({ "a": 1, "b.c": 2 }));
        assert_eq!(
            plan.export(json!({ "a": 1, "z": 0 })).unwrap(),
            json!({ "a": 1, "z": 0 })
        );
    }

    #[test]
    fn hydrate_with_hooks() {
        let info = ClassInfo::new("T")
            .with_field(field(
                "age",
                &[
                    Directive::MapFrom("person.age".into()),
                    Directive::CastWith("int".into()),
                    Directive::ValidationRule(ValidationRule::parse("min:18")),
                ],
            ))
            .with_field(field("name", &[Directive::CastWith("upper".into())]))
            .with_field(field("tags", &[Directive::MapFrom("items.*.tag".into())]))
            .with_field(field(
                "email",
                &[Directive::ValidationRule(ValidationRule::parse("required"))],
            ));
        let plan = ConstructionPlan::build(&info).unwrap();
        assert!(plan.flags().contains(PlanFlags::HOOKED | PlanFlags::MAPS_FROM));

        let source = json!({
            "person": { "age": "42" },
            "name": "ada",
            "items": [{ "tag": "x" }, { "tag": "y" }],
            "email": "a@b.c",
        });
        assert_eq!(
            plan.hydrate(&source, &Hooks).unwrap(),
            json!({ "age": 42, "name": "ADA", "tags": ["x", "y"], "email": "a@b.c" })
        );

        let source = json!({ "person": { "age": "12" }, "email": "a@b.c" });
        assert_eq!(plan.hydrate(&source, &Hooks).unwrap_err().message(), "too small");

        let source = json!({ "person": { "age": "30" } });
        let err = plan.hydrate(&source, &Hooks).unwrap_err();
        assert_eq!(err.to_string(), "field `email`: is required");

        let source = json!({ "person": { "age": "old" } });
        assert_eq!(plan.hydrate(&source, &Hooks).unwrap_err().field(), "age");
    }

    #[test]
    fn export_reshapes() {
        let info = ClassInfo::new("T")
            .with_field(field("email", &[Directive::MapTo("contact.email".into())]))
            .with_field(field("secret", &[Directive::Hidden]))
            .with_field(field("id", &[]));
        let plan = ConstructionPlan::build(&info).unwrap();

        let exported = plan
            .export(json!({ "id": 7, "secret": "s", "email": "a@b.c", "extra": true }))
            .unwrap();
        assert_eq!(
            exported,
            json!({ "contact": { "email": "a@b.c" }, "id": 7, "extra": true })
        );
        assert_eq!(plan.export(json!([1])).unwrap(), json!([1]));
    }
}
