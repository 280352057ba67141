//! Boundary normalisation of loosely-typed detector/OCR payloads.
//!
//! Upstream collaborators hand over JSON with several possible key aliases
//! (`label`/`class`/`name`, `source_id`/`from`, bbox as flat array or four
//! corner points, ...). Everything is folded into the canonical records of
//! [`super::schema`] here so the engine never sees the loose shapes.

use serde_json::{Map, Value};

use super::schema::*;
use super::InputError;

const LABEL_KEYS: &[&str] = &["label", "class", "class_name", "name"];
const CLASS_KEYS: &[&str] = &["class", "class_name"];
const TAG_KEYS: &[&str] = &["tag_number", "tag"];
const SOURCE_KEYS: &[&str] = &["source_id", "from", "source"];
const TARGET_KEYS: &[&str] = &["target_id", "to", "target"];
const BBOX_KEYS: &[&str] = &["bbox", "box", "points"];

impl DrawingInput {
    /// Normalise a raw drawing payload.
    ///
    /// Fails only on structurally invalid input (non-object payload, a
    /// collection that is not a list, a list entry of the wrong kind, or a
    /// symbol without any position information).
    pub fn from_json(value: &Value) -> Result<Self, InputError> {
        let obj = value
            .as_object()
            .ok_or_else(|| InputError::Structure("drawing payload must be an object".to_string()))?;

        let mut input = DrawingInput::default();

        for (i, item) in list_field(obj, "symbols")?.iter().enumerate() {
            input.symbols.push(parse_symbol(item, i)?);
        }

        for (i, item) in list_field(obj, "connections")?.iter().enumerate() {
            match parse_connection(item, i)? {
                Some(conn) => input.connections.push(conn),
                None => tracing::debug!("Connection #{} has no usable endpoints, ignoring", i),
            }
        }

        for (i, item) in list_field(obj, "lines")?.iter().enumerate() {
            match parse_line(item) {
                Some(line) => input.lines.push(line),
                None => tracing::debug!("Line #{} is not a recognised segment shape, ignoring", i),
            }
        }

        for (i, item) in list_field(obj, "texts")?.iter().enumerate() {
            if let Some(text) = parse_text(item, i)? {
                input.texts.push(text);
            }
        }

        Ok(input)
    }

    pub fn from_json_str(json: &str) -> Result<Self, InputError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }
}

fn list_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a [Value], InputError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(InputError::Structure(format!(
            "'{}' must be a list, got {}",
            key,
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(as_f64)
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn as_point(value: &Value) -> Option<Position> {
    match value {
        Value::Array(xy) if xy.len() >= 2 => Some(Position::new(as_f64(&xy[0])?, as_f64(&xy[1])?)),
        Value::Object(o) => Some(Position::new(number(o, "x")?, number(o, "y")?)),
        _ => None,
    }
}

/// Accepts `[x1, y1, x2, y2]`, `[[x, y] x N]` corner lists and
/// `{x1, y1, x2, y2}` / `{min_x, min_y, max_x, max_y}` objects.
fn parse_bbox(value: &Value) -> Option<BBox> {
    match value {
        Value::Array(items) if items.len() == 4 && items.iter().all(|v| as_f64(v).is_some()) => {
            Some(BBox::new(
                as_f64(&items[0])?,
                as_f64(&items[1])?,
                as_f64(&items[2])?,
                as_f64(&items[3])?,
            ))
        }
        Value::Array(items) => {
            let points: Option<Vec<Position>> = items.iter().map(as_point).collect();
            BBox::from_points(&points?)
        }
        Value::Object(o) => {
            if let (Some(x1), Some(y1), Some(x2), Some(y2)) =
                (number(o, "x1"), number(o, "y1"), number(o, "x2"), number(o, "y2"))
            {
                return Some(BBox::new(x1, y1, x2, y2));
            }
            Some(BBox::new(
                number(o, "min_x")?,
                number(o, "min_y")?,
                number(o, "max_x")?,
                number(o, "max_y")?,
            ))
        }
        _ => None,
    }
}

fn parse_symbol(value: &Value, index: usize) -> Result<Symbol, InputError> {
    let obj = value.as_object().ok_or_else(|| {
        InputError::Structure(format!(
            "symbol #{} must be an object, got {}",
            index,
            kind_of(value)
        ))
    })?;

    let id = first_string(obj, &["id"]).unwrap_or_else(|| format!("symbol_{}", index));
    let label = first_string(obj, LABEL_KEYS).unwrap_or_default();
    let class = first_string(obj, CLASS_KEYS).filter(|c| *c != label);
    let tag_number = first_string(obj, TAG_KEYS);

    let bbox = BBOX_KEYS.iter().find_map(|k| obj.get(*k).and_then(parse_bbox));
    let width = number(obj, "width").or_else(|| bbox.map(|b| b.width())).unwrap_or(0.0);
    let height = number(obj, "height").or_else(|| bbox.map(|b| b.height())).unwrap_or(0.0);

    let position = match (number(obj, "x"), number(obj, "y"), bbox) {
        (Some(x), Some(y), _) => Position::new(x, y),
        (_, _, Some(b)) => b.center(),
        _ => return Err(InputError::MissingPosition(id)),
    };
    let bbox = bbox.unwrap_or_else(|| BBox::from_center(position, width, height));

    Ok(Symbol {
        id,
        label,
        class,
        tag_number,
        position,
        width,
        height,
        bbox,
        confidence: number(obj, "confidence"),
    })
}

fn parse_connection(value: &Value, index: usize) -> Result<Option<Connection>, InputError> {
    let obj = value.as_object().ok_or_else(|| {
        InputError::Structure(format!(
            "connection #{} must be an object, got {}",
            index,
            kind_of(value)
        ))
    })?;
    Ok(first_string(obj, SOURCE_KEYS)
        .zip(first_string(obj, TARGET_KEYS))
        .map(|(source, target)| Connection::new(source, target)))
}

fn parse_line(value: &Value) -> Option<LineSegment> {
    match value {
        Value::Array(_) => {
            let b = parse_bbox_raw(value)?;
            Some(LineSegment { start: b.0, end: b.1 })
        }
        Value::Object(o) => {
            if let (Some(start), Some(end)) = (o.get("start"), o.get("end")) {
                return Some(LineSegment {
                    start: as_point(start)?,
                    end: as_point(end)?,
                });
            }
            Some(LineSegment {
                start: Position::new(number(o, "x1")?, number(o, "y1")?),
                end: Position::new(number(o, "x2")?, number(o, "y2")?),
            })
        }
        _ => None,
    }
}

/// Line endpoints keep their direction, so they cannot go through `BBox`.
fn parse_bbox_raw(value: &Value) -> Option<(Position, Position)> {
    let items = value.as_array()?;
    if items.len() == 4 {
        if let (Some(x1), Some(y1), Some(x2), Some(y2)) = (
            as_f64(&items[0]),
            as_f64(&items[1]),
            as_f64(&items[2]),
            as_f64(&items[3]),
        ) {
            return Some((Position::new(x1, y1), Position::new(x2, y2)));
        }
    }
    if items.len() == 2 {
        return Some((as_point(&items[0])?, as_point(&items[1])?));
    }
    None
}

fn parse_text(value: &Value, index: usize) -> Result<Option<TextFragment>, InputError> {
    let (text, bbox) = match value {
        Value::String(s) => (s.clone(), None),
        Value::Object(o) => (
            first_string(o, &["text", "content"]).unwrap_or_default(),
            BBOX_KEYS.iter().find_map(|k| o.get(*k).and_then(parse_bbox)),
        ),
        // EasyOCR style: [corner_points, text, confidence]
        Value::Array(items) if items.len() >= 2 => (
            items[1].as_str().unwrap_or_default().to_string(),
            parse_bbox(&items[0]),
        ),
        other => {
            return Err(InputError::Structure(format!(
                "text #{} must be an object, string or [bbox, text] pair, got {}",
                index,
                kind_of(other)
            )))
        }
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Ok(None);
    }
    let bbox = bbox.unwrap_or_else(|| {
        tracing::debug!("OCR fragment #{} '{}' has no bbox, placing at origin", index, text);
        BBox::new(0.0, 0.0, 0.0, 0.0)
    });
    Ok(Some(TextFragment::new(text, bbox)))
}
