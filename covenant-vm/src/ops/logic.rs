//! Logical operations and the explicit `fail`. All varargs short-circuit
//! left to right.

use crate::error::ExecError;
use crate::eval::CallParams;
use crate::ops::{byte_operand, TRUE};

pub(super) fn and<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    for n in 0..p.arity() as usize {
        if p.arg(n)?.is_empty() {
            return Ok(Vec::new());
        }
    }
    Ok(TRUE.to_vec())
}

pub(super) fn or<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    for n in 0..p.arity() as usize {
        if !p.arg(n)?.is_empty() {
            return Ok(TRUE.to_vec());
        }
    }
    Ok(Vec::new())
}

pub(super) fn first_case_index<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    for n in 0..p.arity() as usize {
        if !p.arg(n)?.is_empty() {
            return Ok(vec![n as u8]);
        }
    }
    Ok(Vec::new())
}

pub(super) fn first_equal_index<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    if p.arity() == 0 {
        return Err(p.panic("needle argument is required"));
    }
    let needle = p.arg(0)?;
    for n in 1..p.arity() as usize {
        if p.arg(n)? == needle {
            return Ok(vec![(n - 1) as u8]);
        }
    }
    Ok(Vec::new())
}

pub(super) fn select_case_by_index<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    if p.arity() == 0 {
        return Err(p.panic("selector argument is required"));
    }
    let idx = byte_operand(p, 0)? as usize;
    if idx + 1 < p.arity() as usize {
        p.arg(idx + 1)
    } else {
        Ok(Vec::new())
    }
}

pub(super) fn fail<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let msg = p.arg(0)?;
    let text = match msg.as_slice() {
        [code] => format!("error #{code}"),
        bytes => String::from_utf8_lossy(bytes).into_owned(),
    };
    Err(p.panic_verbatim(text))
}

#[cfg(test)]
mod tests {
    use crate::context::GlobalData;
    use crate::error::{Error, ExecError};
    use crate::library::Library;

    fn eval(source: &str) -> Result<Vec<u8>, Error> {
        Library::<()>::base().eval_from_source(&GlobalData::unit(), source, &[])
    }

    fn eval_ok(source: &str) -> Vec<u8> {
        eval(source).expect("expression evaluates")
    }

    #[test]
    fn and_or_truth_tables() {
        assert_eq!(eval_ok("and(0x01, 0xff)"), vec![1]);
        assert_eq!(eval_ok("and(0x01, nil)"), Vec::<u8>::new());
        assert_eq!(eval_ok("and"), vec![1]);
        assert_eq!(eval_ok("or(nil, 0x01)"), vec![1]);
        assert_eq!(eval_ok("or(nil, nil)"), Vec::<u8>::new());
        assert_eq!(eval_ok("or"), Vec::<u8>::new());
    }

    #[test]
    fn varargs_short_circuit() {
        // The failing tail is never reached.
        assert_eq!(eval_ok("and(nil, fail(0x01))"), Vec::<u8>::new());
        assert_eq!(eval_ok("or(0x01, fail(0x01))"), vec![1]);
        assert_eq!(eval_ok("firstCaseIndex(nil, 0x07, fail(0x01))"), vec![1]);
        assert_eq!(
            eval_ok("selectCaseByIndex(0, 0xaa, fail(0x01))"),
            vec![0xaa]
        );
    }

    #[test]
    fn case_selection() {
        assert_eq!(eval_ok("firstCaseIndex(nil, nil, 0x01)"), vec![2]);
        assert_eq!(eval_ok("firstCaseIndex(nil, nil)"), Vec::<u8>::new());
        assert_eq!(
            eval_ok("firstEqualIndex(0xbb, 0xaa, 0xbb, 0xcc)"),
            vec![1]
        );
        assert_eq!(
            eval_ok("firstEqualIndex(0x99, 0xaa, 0xbb)"),
            Vec::<u8>::new()
        );
        assert_eq!(eval_ok("selectCaseByIndex(1, 0xaa, 0xbb)"), vec![0xbb]);
        assert_eq!(eval_ok("selectCaseByIndex(5, 0xaa, 0xbb)"), Vec::<u8>::new());
        assert!(matches!(
            eval("selectCaseByIndex(u16/1, 0xaa, 0xbb)"),
            Err(Error::Exec(ExecError::Panic(_)))
        ));
    }

    #[test]
    fn fail_message_forms() {
        let err = eval("fail(7)").unwrap_err();
        assert_eq!(
            err,
            Error::Exec(ExecError::Panic("error #7".to_string()))
        );

        let err = eval("fail(0x6f7574206f662072616e6765)").unwrap_err();
        assert_eq!(
            err,
            Error::Exec(ExecError::Panic("out of range".to_string()))
        );

        let err = eval("!!!deposit_too_small").unwrap_err();
        assert_eq!(
            err,
            Error::Exec(ExecError::Panic("deposit too small".to_string()))
        );
    }
}
