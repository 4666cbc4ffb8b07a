//! Function signatures and the static checks run when a call is built.

use crate::datatype::{AttributeType, Datatype};
use crate::error::{PolicyError, Result};

/// Parameter list of a first-order function. With `varargs`, the last
/// parameter type may repeat any number of times, including zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    parameters: Vec<Datatype>,
    varargs: bool,
}

/// How a first-order function's parameters are laid out, which selects the
/// evaluation strategy of its calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// Every parameter is a value of the same attribute type.
    SinglePrimitive(AttributeType),
    /// Every parameter is a single value, types differ.
    MultiPrimitive,
    /// Every parameter is a bag.
    Bags,
    /// Single values first, then bags.
    PartlyBag,
}

impl FunctionSignature {
    pub fn fixed(parameters: impl Into<Vec<Datatype>>) -> Self {
        Self {
            parameters: parameters.into(),
            varargs: false,
        }
    }

    pub fn varargs(parameters: impl Into<Vec<Datatype>>) -> Self {
        Self {
            parameters: parameters.into(),
            varargs: true,
        }
    }

    pub fn parameters(&self) -> &[Datatype] {
        &self.parameters
    }

    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    /// Smallest accepted argument count.
    pub fn min_arity(&self) -> usize {
        if self.varargs {
            self.parameters.len().saturating_sub(1)
        } else {
            self.parameters.len()
        }
    }

    pub fn accepts_arity(&self, count: usize) -> bool {
        if self.varargs {
            count >= self.min_arity()
        } else {
            count == self.parameters.len()
        }
    }

    /// Expected datatype of argument `index`.
    pub fn parameter_type(&self, index: usize) -> Option<Datatype> {
        match self.parameters.get(index) {
            Some(t) => Some(*t),
            None if self.varargs => self.parameters.last().copied(),
            None => None,
        }
    }

    fn expected_arity(&self) -> String {
        if self.varargs {
            format!("at least {}", self.min_arity())
        } else {
            self.parameters.len().to_string()
        }
    }

    /// Checks a call with static arguments of datatypes `args`, followed by
    /// runtime-only arguments of types `remaining`. Returns the expected
    /// datatype of every argument position.
    pub fn check_call(
        &self,
        function: &str,
        args: &[Datatype],
        remaining: &[AttributeType],
    ) -> Result<Vec<Datatype>> {
        let total = args.len() + remaining.len();
        if !self.accepts_arity(total) {
            return Err(PolicyError::InvalidArity {
                function: function.to_string(),
                expected: self.expected_arity(),
                actual: total,
            });
        }

        let actual_types = args
            .iter()
            .copied()
            .chain(remaining.iter().map(|t| t.datatype()));
        let mut expected_types = Vec::with_capacity(total);
        for (index, actual) in actual_types.enumerate() {
            let expected = self
                .parameter_type(index)
                .ok_or_else(|| PolicyError::InvalidArity {
                    function: function.to_string(),
                    expected: self.expected_arity(),
                    actual: total,
                })?;
            if expected != actual {
                return Err(PolicyError::ArgumentType {
                    function: function.to_string(),
                    index,
                    expected,
                    actual,
                });
            }
            expected_types.push(expected);
        }
        Ok(expected_types)
    }

    /// Shape of the parameter list. Functions are not valid first-order
    /// parameters.
    pub fn shape(&self, function: &str) -> Result<ArgShape> {
        let invalid = |reason: &str| PolicyError::InvalidSignature {
            function: function.to_string(),
            reason: reason.to_string(),
        };
        let Some(first) = self.parameters.first() else {
            return Err(invalid("no parameter"));
        };
        if self.parameters.contains(&Datatype::Function) {
            return Err(invalid("function parameter in a first-order function"));
        }

        let bags = self.parameters.iter().filter(|t| t.is_bag()).count();
        if bags == self.parameters.len() {
            return Ok(ArgShape::Bags);
        }
        if bags > 0 {
            let first_bag = self.parameters.iter().position(Datatype::is_bag).unwrap_or(0);
            if self.parameters[first_bag..].iter().any(|t| !t.is_bag()) {
                return Err(invalid("single value parameter after a bag"));
            }
            return Ok(ArgShape::PartlyBag);
        }
        match first {
            Datatype::Attribute(t) if self.parameters.iter().all(|p| p == first) => {
                Ok(ArgShape::SinglePrimitive(*t))
            }
            _ => Ok(ArgShape::MultiPrimitive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_arity() {
        let sig = FunctionSignature::fixed([Datatype::STRING, Datatype::STRING]);
        assert!(sig.check_call("f", &[Datatype::STRING, Datatype::STRING], &[]).is_ok());
        let err = sig.check_call("f", &[Datatype::STRING], &[]).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::InvalidArity { ref expected, actual: 1, .. } if expected == "2"
        ));
        assert!(sig
            .check_call("f", &[Datatype::STRING, Datatype::STRING, Datatype::STRING], &[])
            .is_err());
    }

    #[test]
    fn test_varargs_repeat_last_type() {
        let sig = FunctionSignature::varargs([Datatype::INTEGER, Datatype::BOOLEAN]);
        assert_eq!(sig.min_arity(), 1);
        for n in 0..5 {
            let mut args = vec![Datatype::INTEGER];
            args.extend(std::iter::repeat(Datatype::BOOLEAN).take(n));
            assert_eq!(sig.check_call("n-of", &args, &[]).unwrap().len(), n + 1);
        }
        assert!(sig.check_call("n-of", &[], &[]).is_err());
        let err = sig
            .check_call("n-of", &[Datatype::INTEGER, Datatype::STRING], &[])
            .unwrap_err();
        assert!(matches!(err, PolicyError::ArgumentType { index: 1, .. }));
    }

    #[test]
    fn test_remaining_args_count_and_type() {
        let sig = FunctionSignature::fixed([Datatype::STRING, Datatype::STRING]);
        assert!(sig
            .check_call("f", &[Datatype::STRING], &[AttributeType::String])
            .is_ok());
        assert!(sig.check_call("f", &[], &[AttributeType::String; 2]).is_ok());
        let err = sig
            .check_call("f", &[Datatype::STRING], &[AttributeType::Integer])
            .unwrap_err();
        assert!(matches!(err, PolicyError::ArgumentType { index: 1, .. }));

        // a remaining arg never matches a bag parameter
        let bag_sig = FunctionSignature::fixed([AttributeType::String.bag()]);
        assert!(bag_sig.check_call("f", &[], &[AttributeType::String]).is_err());
    }

    #[test]
    fn test_shapes() {
        let s = AttributeType::String;
        assert_eq!(
            FunctionSignature::fixed([Datatype::STRING; 2]).shape("f").unwrap(),
            ArgShape::SinglePrimitive(s)
        );
        assert_eq!(
            FunctionSignature::fixed([Datatype::STRING, Datatype::INTEGER])
                .shape("f")
                .unwrap(),
            ArgShape::MultiPrimitive
        );
        assert_eq!(
            FunctionSignature::fixed([s.bag(), s.bag()]).shape("f").unwrap(),
            ArgShape::Bags
        );
        assert_eq!(
            FunctionSignature::fixed([Datatype::STRING, s.bag()])
                .shape("f")
                .unwrap(),
            ArgShape::PartlyBag
        );
        assert!(FunctionSignature::fixed([Datatype::Function]).shape("f").is_err());
        assert!(FunctionSignature::fixed(Vec::<Datatype>::new()).shape("f").is_err());
    }

    #[test]
    fn test_partly_bag_needs_values_before_bags() {
        let s = AttributeType::String;
        assert_eq!(
            FunctionSignature::fixed([Datatype::STRING, Datatype::INTEGER, s.bag(), s.bag()])
                .shape("f")
                .unwrap(),
            ArgShape::PartlyBag
        );
        for params in [
            vec![s.bag(), Datatype::STRING],
            vec![Datatype::STRING, s.bag(), Datatype::STRING],
        ] {
            let err = FunctionSignature::fixed(params).shape("f").unwrap_err();
            assert!(matches!(err, PolicyError::InvalidSignature { .. }));
        }
        // varargs repeats the last parameter, a bag here
        assert_eq!(
            FunctionSignature::varargs([Datatype::STRING, s.bag()])
                .shape("f")
                .unwrap(),
            ArgShape::PartlyBag
        );
    }
}
