use super::argument::Argument;
use super::mention::parse_index;
use super::script::ScriptError;
use super::token::{Token, TokenForm};

const SUBJ_MARKER: &str = ":SUBJ:";
const OBJ_MARKER: &str = ":OBJ:";
const POBJ_MARKER: &str = ":POBJ:";
const NONE_ARG: &str = "NONE";

/// The syntactic role an argument fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgSlot {
    Subj,
    Obj,
    Pobj,
}

impl ArgSlot {
    pub const ALL: [ArgSlot; 3] = [ArgSlot::Subj, ArgSlot::Obj, ArgSlot::Pobj];

    /// 1-based position used in serialized pair instances.
    pub fn position(&self) -> u8 {
        match self {
            Self::Subj => 1,
            Self::Obj => 2,
            Self::Pobj => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Subj => "SUBJ",
            Self::Obj => "OBJ",
            Self::Pobj => "POBJ",
        }
    }
}

/// The verb of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub token: Token,
    pub neg: bool,
    /// Verb particle (`up` in `pick up`), empty when absent.
    pub prt: String,
}

impl Predicate {
    /// The particle may not contain `:` or whitespace, which delimit the
    /// text form.
    pub fn new(token: Token, neg: bool, prt: impl Into<String>) -> Result<Self, ScriptError> {
        let prt = prt.into();
        if prt.contains(|c: char| c == ':' || c.is_whitespace()) {
            return Err(ScriptError::Parse(format!(
                "bad particle {:?} for predicate {:?}",
                prt, token.word
            )));
        }
        Ok(Self { token, neg, prt })
    }

    pub fn representation(&self, form: TokenForm) -> String {
        self.token.string_form(form)
    }

    /// Negation and particle folded in: `not_pick_up`.
    pub fn full_representation(&self, use_lemma: bool) -> String {
        let mut repr = String::new();
        if self.neg {
            repr.push_str("not_");
        }
        repr.push_str(&self.token.string_form(TokenForm::new(use_lemma)));
        if !self.prt.is_empty() {
            repr.push('_');
            repr.push_str(&self.prt.to_lowercase());
        }
        repr
    }

    /// `token_idx:neg:prt:token`
    pub fn to_text(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.token.token_idx,
            if self.neg { 1 } else { 0 },
            self.prt,
            self.token.to_text()
        )
    }

    pub fn from_text(text: &str) -> Result<Predicate, ScriptError> {
        let fields: Vec<&str> = text.splitn(4, ':').collect();
        if fields.len() != 4 {
            return Err(ScriptError::Parse(format!("malformed predicate: {:?}", text)));
        }
        let token_idx = parse_index(fields[0], text)?;
        let neg = match fields[1] {
            "1" => true,
            "0" => false,
            other => {
                return Err(ScriptError::Parse(format!(
                    "bad negation flag {:?} in predicate {:?}",
                    other, text
                )))
            }
        };
        Predicate::new(Token::from_text(fields[3], token_idx)?, neg, fields[2])
    }
}

/// One predicate occurrence with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub pred: Predicate,
    pub subj: Option<Argument>,
    pub obj: Option<Argument>,
    /// `(preposition, object)` pairs in surface order.
    pub pobj_list: Vec<(String, Argument)>,
}

impl Event {
    /// An event needs a subject or an object.
    pub fn new(
        pred: Predicate,
        subj: Option<Argument>,
        obj: Option<Argument>,
        pobj_list: Vec<(String, Argument)>,
    ) -> Result<Event, ScriptError> {
        if subj.is_none() && obj.is_none() {
            return Err(ScriptError::Parse(format!(
                "event {:?} has neither subject nor object",
                pred.token.word
            )));
        }
        Ok(Event {
            pred,
            subj,
            obj,
            pobj_list,
        })
    }

    /// Every argument in slot order: subject, object, then prepositional objects.
    pub fn all_args(&self) -> impl Iterator<Item = &Argument> {
        self.labeled_args().map(|(_, arg)| arg)
    }

    pub fn labeled_args(&self) -> impl Iterator<Item = (ArgSlot, &Argument)> {
        self.subj
            .iter()
            .map(|arg| (ArgSlot::Subj, arg))
            .chain(self.obj.iter().map(|arg| (ArgSlot::Obj, arg)))
            .chain(self.pobj_list.iter().map(|(_, arg)| (ArgSlot::Pobj, arg)))
    }

    pub fn to_text(&self) -> String {
        let mut text = format!(
            "{} {} {} {} {}",
            self.pred.to_text(),
            SUBJ_MARKER,
            arg_text(&self.subj),
            OBJ_MARKER,
            arg_text(&self.obj)
        );
        for (prep, pobj) in &self.pobj_list {
            text.push_str(&format!(" {}{} {}", POBJ_MARKER, prep, pobj.to_text()));
        }
        text
    }

    /// Parse `pred :SUBJ: subj :OBJ: obj [:POBJ:prep pobj]...`.
    pub fn from_text(text: &str) -> Result<Event, ScriptError> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() < 5 || fields[1] != SUBJ_MARKER || fields[3] != OBJ_MARKER {
            return Err(ScriptError::Parse(format!("malformed event: {:?}", text)));
        }
        let pred = Predicate::from_text(fields[0])?;
        let subj = parse_optional_arg(fields[2])?;
        let obj = parse_optional_arg(fields[4])?;

        let rest = &fields[5..];
        if rest.len() % 2 != 0 {
            return Err(ScriptError::Parse(format!(
                "dangling prepositional object in event: {:?}",
                text
            )));
        }
        let mut pobj_list = Vec::with_capacity(rest.len() / 2);
        for group in rest.chunks(2) {
            let prep = group[0].strip_prefix(POBJ_MARKER).ok_or_else(|| {
                ScriptError::Parse(format!("expected {} in event: {:?}", POBJ_MARKER, text))
            })?;
            pobj_list.push((prep.to_string(), Argument::from_text(group[1])?));
        }

        Event::new(pred, subj, obj, pobj_list)
    }
}

fn arg_text(arg: &Option<Argument>) -> String {
    arg.as_ref()
        .map_or_else(|| NONE_ARG.to_string(), Argument::to_text)
}

fn parse_optional_arg(field: &str) -> Result<Option<Argument>, ScriptError> {
    if field == NONE_ARG {
        Ok(None)
    } else {
        Argument::from_text(field).map(Some)
    }
}
