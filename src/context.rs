use serde_json::Value;

/// The layered context template references resolve against. Each layer has a
/// root name (`input`, `output`, ...); a reference like `input.body.name`
/// picks the layer by its first segment and walks the rest of the path into
/// that layer's value. Later layers shadow earlier ones with the same root
/// name, so during output rendering `output` wins over an `input` root of
/// the same name.
///
/// Built fresh per invocation and never persisted.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    layers: Vec<(String, Value)>,
}

enum Seg {
    Key(String),
    Index(usize),
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn with_input(event: Value) -> Self {
        let mut ctx = Self::new();
        ctx.push("input", event);
        ctx
    }

    pub fn push(&mut self, name: &str, value: Value) {
        self.layers.push((name.to_string(), value));
    }

    /// Dotted-path lookup with `[idx]` array indexing, e.g.
    /// `input.records[0].body`. Returns `None` for any unresolved reference;
    /// an absent value is never an error at this level.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let segs = parse_path(path)?;
        let (root, rest) = segs.split_first()?;

        let root_key = match root {
            Seg::Key(k) => k,
            Seg::Index(_) => return None,
        };

        // Walk layers back to front so the most recently pushed root wins.
        let layer = self
            .layers
            .iter()
            .rev()
            .find(|(name, _)| name == root_key)
            .map(|(_, value)| value)?;

        let mut current = layer;
        for seg in rest {
            match (seg, current) {
                (Seg::Key(k), Value::Object(obj)) => current = obj.get(k)?,
                (Seg::Index(i), Value::Array(arr)) => current = arr.get(*i)?,
                // Bare numeric keys index into arrays too.
                (Seg::Key(k), Value::Array(arr)) => {
                    let idx: usize = k.parse().ok()?;
                    current = arr.get(idx)?;
                }
                _ => return None,
            }
        }

        Some(current.clone())
    }
}

// Splits "records[0].body" into Key("records"), Index(0), Key("body").
fn parse_path(path: &str) -> Option<Vec<Seg>> {
    let mut segs = Vec::new();

    for part in path.split('.') {
        if part.is_empty() {
            return None;
        }

        let mut rest = part;
        while let Some(open) = rest.find('[') {
            let key = &rest[..open];
            if !key.is_empty() {
                segs.push(Seg::Key(key.to_string()));
            }
            let close = rest.find(']')?;
            let idx: usize = rest[open + 1..close].parse().ok()?;
            segs.push(Seg::Index(idx));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segs.push(Seg::Key(rest.to_string()));
        }
    }

    if segs.is_empty() { None } else { Some(segs) }
}
