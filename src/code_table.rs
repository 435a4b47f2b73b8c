use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Character → code pairs of the built-in table, in display order.
pub const STANDARD_PAIRS: &[(char, &str)] = &[
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('0', "-----"),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('.', ".-.-.-"),
    (',', "--..--"),
    ('?', "..--.."),
    ('\'', ".----."),
    ('!', "-.-.--"),
    ('/', "-..-."),
    ('(', "-.--."),
    (')', "-.--.-"),
    ('&', ".-..."),
    (':', "---..."),
    (';', "-.-.-."),
    ('=', "-...-"),
    ('+', ".-.-."),
    ('-', "-....-"),
    ('_', "..--.-"),
    ('"', ".-..-."),
    ('$', "...-..-"),
    ('@', ".--.-."),
    (' ', "/"),
];

static STANDARD: LazyLock<CodeTable> = LazyLock::new(|| {
    CodeTable::from_pairs(STANDARD_PAIRS.iter().copied())
        .expect("built-in Morse table must be a bijection")
});

/// Errors raised while building a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("symbol '{0}' is listed more than once")]
    DuplicateSymbol(char),

    #[error("code '{code}' is shared by '{first}' and '{second}'")]
    DuplicateCode { code: String, first: char, second: char },

    #[error("symbol '{0}' has an empty code")]
    EmptyCode(char),
}

/// Bidirectional character ↔ Morse code mapping. Immutable once built.
#[derive(Debug, Clone)]
pub struct CodeTable {
    order: Vec<char>,
    forward: HashMap<char, String>,
    reverse: HashMap<String, char>,
}

impl CodeTable {
    /// Build both directions in one pass, rejecting anything that would
    /// break the bijection.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        let mut order = Vec::new();
        let mut forward = HashMap::new();
        let mut reverse: HashMap<String, char> = HashMap::new();

        for (symbol, code) in pairs {
            let code = code.into();
            if code.is_empty() {
                return Err(TableError::EmptyCode(symbol));
            }
            if forward.contains_key(&symbol) {
                return Err(TableError::DuplicateSymbol(symbol));
            }
            if let Some(&first) = reverse.get(&code) {
                return Err(TableError::DuplicateCode {
                    code,
                    first,
                    second: symbol,
                });
            }
            reverse.insert(code.clone(), symbol);
            forward.insert(symbol, code);
            order.push(symbol);
        }

        Ok(CodeTable {
            order,
            forward,
            reverse,
        })
    }

    /// The process-wide built-in table.
    pub fn standard() -> &'static CodeTable {
        &STANDARD
    }

    pub fn encode(&self, symbol: char) -> Option<&str> {
        self.forward.get(&symbol).map(String::as_str)
    }

    pub fn decode(&self, code: &str) -> Option<char> {
        self.reverse.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in the order they were supplied.
    pub fn iter(&self) -> impl Iterator<Item = (char, &str)> + '_ {
        self.order
            .iter()
            .map(|c| (*c, self.forward[c].as_str()))
    }
}
