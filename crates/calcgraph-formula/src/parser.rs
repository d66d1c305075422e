//! Formula parser
//!
//! A recursive descent parser for the formula language with proper operator
//! precedence. Positions reported in syntax errors are byte offsets into the
//! formula body, i.e. the text after the `=` sigil.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult, SyntaxErrorKind};
use calcgraph_core::{CellAddress, CellRange, CellValue};

/// First character of every formula input
pub const FORMULA_SIGIL: char = '=';

/// Parse a formula string into an AST
///
/// The leading `=` sigil is optional; graph definitions are usually written
/// without it.
///
/// # Example
/// ```rust
/// use calcgraph_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("sin(x) * 2").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let body = formula.strip_prefix(FORMULA_SIGIL).unwrap_or(formula);

    let mut parser = FormulaParser::new(body)?;
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    match parser.current_token() {
        Token::Eof => Ok(expr),
        Token::RightParen => Err(FormulaError::syntax(
            SyntaxErrorKind::UnmatchedParenthesis,
            parser.token_start,
        )),
        other => Err(FormulaError::syntax(
            SyntaxErrorKind::UnexpectedToken(other.describe()),
            parser.token_start,
        )),
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),

    // Function name, cell reference or free variable
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,

    // End of input
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::String(s) => format!("\"{}\"", s),
            Token::Identifier(name) => name.clone(),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Caret => "'^'".into(),
            Token::Ampersand => "'&'".into(),
            Token::Equal => "'='".into(),
            Token::NotEqual => "'<>'".into(),
            Token::LessThan => "'<'".into(),
            Token::LessEqual => "'<='".into(),
            Token::GreaterThan => "'>'".into(),
            Token::GreaterEqual => "'>='".into(),
            Token::Colon => "':'".into(),
            Token::Comma => "','".into(),
            Token::LeftParen => "'('".into(),
            Token::RightParen => "')'".into(),
            Token::Eof => "end of formula".into(),
        }
    }
}

/// Check whether an identifier is a cell reference (`[A-Z]+[0-9]+`)
fn is_cell_reference(text: &str) -> bool {
    lazy_regex::regex_is_match!(r"^[A-Z]+[0-9]+$", text)
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Token,
    /// Byte offset where the current token starts
    token_start: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: Token::Eof,
            token_start: 0,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.skip_whitespace();
        self.token_start = self.pos;
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            return Ok(match self.peek_char() {
                Some('=') => {
                    self.advance();
                    Token::LessEqual
                }
                Some('>') => {
                    self.advance();
                    Token::NotEqual
                }
                _ => Token::LessThan,
            });
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(Token::GreaterEqual);
            }
            return Ok(Token::GreaterThan);
        }

        if c == '"' {
            return self.scan_string();
        }

        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }

        Err(FormulaError::syntax(
            SyntaxErrorKind::UnexpectedCharacter(c),
            self.pos,
        ))
    }

    /// Read up to the next double quote; there is no escape processing
    fn scan_string(&mut self) -> FormulaResult<Token> {
        let open = self.pos;
        self.advance();

        let start = self.pos;
        match self.input[start..].find('"') {
            Some(len) => {
                let s = self.input[start..start + len].to_string();
                self.pos = start + len + 1;
                Ok(Token::String(s))
            }
            None => Err(FormulaError::syntax(
                SyntaxErrorKind::UnterminatedString,
                open,
            )),
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part, only when digits follow
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let sign = usize::from(matches!(self.peek_char_at(1), Some('+') | Some('-')));
            if self
                .peek_char_at(1 + sign)
                .map_or(false, |c| c.is_ascii_digit())
            {
                for _ in 0..=sign {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse().map(Token::Number).map_err(|_| {
            FormulaError::syntax(SyntaxErrorKind::UnexpectedToken(num_str.into()), start)
        })
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        Token::Identifier(self.input[start..self.pos].to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    /// Expect the closing parenthesis of a group opened at `open`
    fn expect_close(&mut self, open: usize) -> FormulaResult<()> {
        match self.current_token() {
            Token::RightParen => {
                self.consume()?;
                Ok(())
            }
            Token::Eof => Err(FormulaError::syntax(
                SyntaxErrorKind::UnmatchedParenthesis,
                open,
            )),
            other => Err(FormulaError::syntax(
                SyntaxErrorKind::UnexpectedToken(other.describe()),
                self.token_start,
            )),
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^ (right associative)
    // 6. Unary: +, -
    // 7. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_concatenation()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume()?;
            let right = self.parse_additive()?;
            left = FormulaExpr::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_power()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_power()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_power(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if matches!(self.current_token(), Token::Caret) {
            self.consume()?;
            let right = self.parse_power()?; // Right associative
            return Ok(FormulaExpr::binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        let op = match self.current_token() {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_primary(),
        };

        self.consume()?;
        let operand = self.parse_unary()?;
        Ok(FormulaExpr::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        let start = self.token_start;

        match self.consume()? {
            Token::Number(n) => Ok(FormulaExpr::number(n)),

            Token::String(s) => Ok(FormulaExpr::text(s)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect_close(start)?;
                Ok(expr)
            }

            Token::Identifier(name) => {
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else if is_cell_reference(&name) {
                    self.parse_reference(&name, start)
                } else if name.eq_ignore_ascii_case("TRUE") {
                    Ok(FormulaExpr::Literal(CellValue::Boolean(true)))
                } else if name.eq_ignore_ascii_case("FALSE") {
                    Ok(FormulaExpr::Literal(CellValue::Boolean(false)))
                } else {
                    Ok(FormulaExpr::Variable(name))
                }
            }

            Token::Eof => Err(FormulaError::syntax(SyntaxErrorKind::UnexpectedEnd, start)),

            other => Err(FormulaError::syntax(
                SyntaxErrorKind::UnexpectedToken(other.describe()),
                start,
            )),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        let open = self.token_start;
        self.consume()?; // '('

        let mut args = Vec::new();

        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume()?;
                args.push(self.parse_expression()?);
            }
        }

        self.expect_close(open)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }

    /// Parse a cell reference, or a range if a `:` and a second reference follow
    fn parse_reference(&mut self, text: &str, start: usize) -> FormulaResult<FormulaExpr> {
        let address = Self::cell_address(text, start)?;

        if !matches!(self.current_token(), Token::Colon) {
            return Ok(FormulaExpr::CellRef(address));
        }

        self.consume()?; // ':'
        let end_start = self.token_start;
        match self.consume()? {
            Token::Identifier(end) if is_cell_reference(&end) => {
                let end = Self::cell_address(&end, end_start)?;
                Ok(FormulaExpr::Range(CellRange::new(address, end)))
            }
            Token::Eof => Err(FormulaError::syntax(
                SyntaxErrorKind::UnexpectedEnd,
                end_start,
            )),
            other => Err(FormulaError::syntax(
                SyntaxErrorKind::InvalidReference(format!("{}:{}", text, other.describe())),
                end_start,
            )),
        }
    }

    fn cell_address(text: &str, start: usize) -> FormulaResult<CellAddress> {
        CellAddress::parse(text).map_err(|_| {
            FormulaError::syntax(SyntaxErrorKind::InvalidReference(text.to_string()), start)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn syntax_error(formula: &str) -> (SyntaxErrorKind, usize) {
        match parse_formula(formula) {
            Err(FormulaError::Syntax { kind, position }) => (kind, position),
            other => panic!("expected syntax error for {formula}, got {other:?}"),
        }
    }

    fn num(n: f64) -> FormulaExpr {
        FormulaExpr::number(n)
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("=42").unwrap(), num(42.0));
        assert_eq!(parse_formula("=3.14").unwrap(), num(3.14));
        assert_eq!(parse_formula("=.5").unwrap(), num(0.5));
        assert_eq!(parse_formula("=1e3").unwrap(), num(1000.0));
    }

    #[test]
    fn test_parse_boolean() {
        assert_eq!(
            parse_formula("=TRUE").unwrap(),
            FormulaExpr::Literal(CellValue::Boolean(true))
        );
        assert_eq!(
            parse_formula("=false").unwrap(),
            FormulaExpr::Literal(CellValue::Boolean(false))
        );
    }

    #[test]
    fn test_sigil_is_optional() {
        assert_eq!(parse_formula("1+2").unwrap(), parse_formula("=1+2").unwrap());
    }

    #[test]
    fn test_parse_string_without_escapes() {
        assert_eq!(
            parse_formula("=\"Hello\"").unwrap(),
            FormulaExpr::text("Hello")
        );
        assert_eq!(
            parse_formula("=\"a\\b\"").unwrap(),
            FormulaExpr::text("a\\b")
        );
        // A doubled quote is two adjacent strings, not an escape
        let (kind, position) = syntax_error("=\"a\"\"b\"");
        assert_eq!(kind, SyntaxErrorKind::UnexpectedToken("\"b\"".into()));
        assert_eq!(position, 3);
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        // 1+(2*3)
        assert_eq!(
            parse_formula("=1+2*3").unwrap(),
            FormulaExpr::binary(
                BinaryOperator::Add,
                num(1.0),
                FormulaExpr::binary(BinaryOperator::Multiply, num(2.0), num(3.0)),
            )
        );

        // (1-2)-3
        assert_eq!(
            parse_formula("=1-2-3").unwrap(),
            FormulaExpr::binary(
                BinaryOperator::Subtract,
                FormulaExpr::binary(BinaryOperator::Subtract, num(1.0), num(2.0)),
                num(3.0),
            )
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(
            parse_formula("=2^3^2").unwrap(),
            FormulaExpr::binary(
                BinaryOperator::Power,
                num(2.0),
                FormulaExpr::binary(BinaryOperator::Power, num(3.0), num(2.0)),
            )
        );
    }

    #[test]
    fn test_unary_binds_tighter_than_power() {
        assert_eq!(
            parse_formula("=-2^2").unwrap(),
            FormulaExpr::binary(
                BinaryOperator::Power,
                FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(num(2.0)),
                },
                num(2.0),
            )
        );
    }

    #[test]
    fn test_parse_comparison_and_concat() {
        assert!(matches!(
            parse_formula("=A1<>B1").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::NotEqual,
                ..
            }
        ));
        assert!(matches!(
            parse_formula("=A1>=5").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::GreaterEqual,
                ..
            }
        ));
        // & binds looser than +
        assert_eq!(
            parse_formula("=\"n\"&1+2").unwrap(),
            FormulaExpr::binary(
                BinaryOperator::Concat,
                FormulaExpr::text("n"),
                FormulaExpr::binary(BinaryOperator::Add, num(1.0), num(2.0)),
            )
        );
    }

    #[test]
    fn test_parse_cell_reference() {
        assert_eq!(
            parse_formula("=A1").unwrap(),
            FormulaExpr::CellRef(CellAddress::new(1, 1))
        );
        assert_eq!(
            parse_formula("=AA27").unwrap(),
            FormulaExpr::CellRef(CellAddress::new(27, 27))
        );
        // Lower-case identifiers are free variables, not references
        assert_eq!(
            parse_formula("=a1").unwrap(),
            FormulaExpr::Variable("a1".into())
        );
    }

    #[test]
    fn test_parse_range_reference() {
        assert_eq!(
            parse_formula("=A1:B10").unwrap(),
            FormulaExpr::Range(CellRange::from_indices(1, 1, 10, 2))
        );
        assert_eq!(
            parse_formula("= B3 : A1 ").unwrap(),
            FormulaExpr::Range(CellRange::from_indices(1, 1, 3, 2))
        );
    }

    #[test]
    fn test_parse_function() {
        assert_eq!(
            parse_formula("=sum(1, A1:A3)").unwrap(),
            FormulaExpr::Function {
                name: "SUM".into(),
                args: vec![
                    num(1.0),
                    FormulaExpr::Range(CellRange::from_indices(1, 1, 3, 1)),
                ],
            }
        );

        // Reference-shaped names followed by '(' are function calls
        assert_eq!(
            parse_formula("=LOG10(100)").unwrap().top_level_function(),
            Some("LOG10")
        );

        assert_eq!(
            parse_formula("=PI()").unwrap(),
            FormulaExpr::Function {
                name: "PI".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_parse_variables() {
        let ast = parse_formula("x^2 + Rate").unwrap();
        assert!(ast.mentions_variable("X"));
        assert!(ast.mentions_variable("rate"));
        assert!(!ast.mentions_variable("t"));
    }

    #[test]
    fn test_whitespace_is_insignificant() {
        assert_eq!(
            parse_formula("=  SUM ( A1 , 2 ) * 3 ").unwrap(),
            parse_formula("=SUM(A1,2)*3").unwrap()
        );
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            syntax_error("=1 + #"),
            (SyntaxErrorKind::UnexpectedCharacter('#'), 4)
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            syntax_error("=\"abc"),
            (SyntaxErrorKind::UnterminatedString, 0)
        );
    }

    #[test]
    fn test_unmatched_parenthesis() {
        assert_eq!(
            syntax_error("=(1+2"),
            (SyntaxErrorKind::UnmatchedParenthesis, 0)
        );
        assert_eq!(
            syntax_error("=SUM(1,2"),
            (SyntaxErrorKind::UnmatchedParenthesis, 3)
        );
        assert_eq!(
            syntax_error("=1+2)"),
            (SyntaxErrorKind::UnmatchedParenthesis, 3)
        );
    }

    #[test]
    fn test_incomplete_expressions() {
        assert_eq!(syntax_error("="), (SyntaxErrorKind::UnexpectedEnd, 0));
        assert_eq!(syntax_error("=1+"), (SyntaxErrorKind::UnexpectedEnd, 2));
        assert!(matches!(
            syntax_error("=A1:"),
            (SyntaxErrorKind::UnexpectedEnd, 3)
        ));
        assert!(matches!(
            syntax_error("=A1:5"),
            (SyntaxErrorKind::InvalidReference(_), 3)
        ));
        assert!(matches!(
            syntax_error("=A0"),
            (SyntaxErrorKind::InvalidReference(_), 0)
        ));
    }
}
