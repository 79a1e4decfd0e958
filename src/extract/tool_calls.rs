/// Tool-call aggregation: complete records and streamed fragment merging.
///
/// Non-streaming payloads carry whole tool-call records; streaming payloads
/// deliver a call as many fragments identified by a stream `index` (preferred,
/// stable across the stream), an `id`, or nothing at all. The aggregator lives
/// for exactly one extraction pass: complete records append immediately,
/// fragments merge by key and flush at the tail in deterministic order.
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;

/// A finished tool invocation record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    #[serde(rename = "type")]
    pub call_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub arguments: String,
}

const DEFAULT_CALL_TYPE: &str = "function";

/// Merge key for in-flight streamed fragments: index over id over a single
/// shared slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FragmentKey {
    Index(i64),
    Id(String),
    Shared,
}

#[derive(Debug, Default)]
struct FragmentBuilder {
    index: Option<i64>,
    id: Option<String>,
    /// First non-empty name wins.
    name: String,
    /// Concatenated in arrival order.
    arguments: String,
}

/// Accumulates tool calls for one extraction pass.
#[derive(Debug, Default)]
pub struct ToolCallAggregator {
    complete: Vec<ToolCall>,
    slots: FxHashMap<FragmentKey, usize>,
    /// In-flight builders in arrival order; final ordering re-sorts by index,
    /// never by map iteration order.
    in_flight: SmallVec<[FragmentBuilder; 4]>,
}

impl ToolCallAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a complete (non-streamed) record, or recursively expand a value
    /// wrapping a nested list of records. Unrecognized shapes contribute
    /// nothing.
    pub fn push_complete(&mut self, record: &Value) {
        match record {
            Value::Array(items) => {
                for item in items {
                    self.push_complete(item);
                }
            }
            Value::Object(map) => {
                if let Some(nested) = map.get("tool_calls").filter(|v| v.is_array()) {
                    self.push_complete(nested);
                    return;
                }
                if let Some(call) = normalize_complete(map) {
                    self.complete.push(call);
                }
            }
            _ => {}
        }
    }

    /// Merge one streamed fragment into its in-flight builder.
    pub fn push_fragment(&mut self, fragment: &Value) {
        let Some(map) = fragment.as_object() else {
            return;
        };

        let index = map.get("index").and_then(Value::as_i64);
        let id = map
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());

        let key = match (index, id) {
            (Some(index), _) => FragmentKey::Index(index),
            (None, Some(id)) => FragmentKey::Id(id.to_string()),
            (None, None) => FragmentKey::Shared,
        };

        let slot = match self.slots.get(&key) {
            Some(&slot) => slot,
            None => {
                self.in_flight.push(FragmentBuilder::default());
                let slot = self.in_flight.len() - 1;
                self.slots.insert(key, slot);
                slot
            }
        };
        let builder = &mut self.in_flight[slot];

        if builder.index.is_none() {
            builder.index = index;
        }
        if builder.id.is_none() {
            builder.id = id.map(str::to_string);
        }

        let function = map
            .get("function")
            .and_then(Value::as_object)
            .unwrap_or(map);
        if builder.name.is_empty() {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                builder.name.push_str(name);
            }
        }
        if let Some(arguments) = function.get("arguments") {
            push_argument_text(&mut builder.arguments, arguments);
        }
    }

    /// Flush merged fragments onto the tail of the complete list and return
    /// the final ordered sequence. Fragments sort by ascending index (missing
    /// index sorts as 0, stable), independent of arrival interleaving across
    /// unrelated keys.
    #[must_use]
    pub fn finish(self) -> Vec<ToolCall> {
        let Self {
            mut complete,
            mut in_flight,
            ..
        } = self;

        in_flight.sort_by_key(|builder| builder.index.unwrap_or(0));
        for builder in in_flight {
            complete.push(ToolCall {
                call_type: DEFAULT_CALL_TYPE.to_string(),
                id: builder.id,
                index: builder.index,
                function: ToolFunction {
                    name: (!builder.name.is_empty()).then_some(builder.name),
                    arguments: builder.arguments,
                },
            });
        }
        complete
    }
}

fn normalize_complete(map: &serde_json::Map<String, Value>) -> Option<ToolCall> {
    // Either an OpenAI-style record with a nested `function`, or a bare
    // function-call record carrying name/arguments directly.
    let function = match map.get("function").and_then(Value::as_object) {
        Some(function) => function,
        None if map.contains_key("name") || map.contains_key("arguments") => map,
        None => return None,
    };

    let name = function
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let mut arguments = String::new();
    if let Some(value) = function.get("arguments") {
        push_argument_text(&mut arguments, value);
    }

    let call_type = map
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CALL_TYPE)
        .to_string();

    Some(ToolCall {
        call_type,
        id: map.get("id").and_then(Value::as_str).map(str::to_string),
        index: map.get("index").and_then(Value::as_i64),
        function: ToolFunction { name, arguments },
    })
}

/// Argument payloads are usually JSON-escaped strings; some providers ship a
/// structured object instead. Either way the record keeps argument text.
fn push_argument_text(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => {}
        other => {
            if let Ok(serialized) = serde_json::to_string(other) {
                out.push_str(&serialized);
            }
        }
    }
}
