//! JNI implementation of [`ForeignRuntime`]
//!
//! Every reference handed to the engine is a global reference, so it outlives
//! the local frame each call runs in. Java exceptions are left pending when a
//! call fails and are described with `Throwable.toString()` when taken.

use jni::errors::Error as JniError;
use jni::objects::{GlobalRef, JClass, JFieldID, JMethodID, JObject, JObjectArray, JStaticFieldID, JStaticMethodID, JString, JValue, JValueOwned};
use jni::signature::{Primitive, ReturnType};
use jni::sys::jvalue;
use jni::{JNIEnv, JavaVM};
use tether_sdk::{ForeignRuntime, NativeValue, ReturnKind, RuntimeError, RuntimeResult};

/// Local references a single call may create before the frame is popped
const FRAME_CAPACITY: i32 = 64;

const STRING_CLASS: &str = "java/lang/String";
const CLASS_SIG: &str = "()Ljava/lang/Class;";
const STRING_SIG: &str = "()Ljava/lang/String;";

#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error(transparent)]
    Jni(#[from] JniError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<CallError> for RuntimeError {
    fn from(err: CallError) -> Self {
        match err {
            // The exception itself stays pending for `take_fault`
            CallError::Jni(JniError::JavaException) => RuntimeError::Fault("java exception".to_string()),
            CallError::Jni(other) => RuntimeError::Unavailable(other.to_string()),
            CallError::Runtime(err) => err,
        }
    }
}

type CallResult<T> = Result<T, CallError>;

/// Resolved method ID
#[derive(Debug, Clone, Copy)]
pub enum JvmMethod {
    /// `GetMethodID` result
    Instance(JMethodID),
    /// `GetStaticMethodID` result
    Static(JStaticMethodID),
}

/// Resolved field, read by name and type token
#[derive(Debug, Clone)]
pub struct JvmField {
    name: String,
    token: String,
    is_static: bool,
}

/// Runtime bound to a JVM; the calling thread must be attached
pub struct JvmRuntime {
    vm: JavaVM,
}

impl JvmRuntime {
    /// Wrap `vm`
    pub fn new(vm: JavaVM) -> Self {
        Self { vm }
    }

    /// Run `f` in a fresh local frame
    fn frame<T, F>(&self, f: F) -> RuntimeResult<T>
    where
        F: FnOnce(&mut JNIEnv) -> CallResult<T>,
    {
        let mut env = self
            .vm
            .get_env()
            .map_err(|e| RuntimeError::Unavailable(format!("thread not attached: {}", e)))?;
        env.with_local_frame(FRAME_CAPACITY, f).map_err(RuntimeError::from)
    }
}

fn as_class(global: &GlobalRef) -> &JClass<'static> {
    <&JClass>::from(global.as_obj())
}

fn java_string(env: &mut JNIEnv, object: JObject) -> CallResult<String> {
    let text = JString::from(object);
    let value: String = env.get_string(&text)?.into();
    Ok(value)
}

/// Call a no-argument method returning a string
fn string_call(env: &mut JNIEnv, target: &JObject, name: &str) -> CallResult<String> {
    let value = env.call_method(target, name, STRING_SIG, &[])?.l()?;
    if value.is_null() {
        return Err(RuntimeError::NotFound(format!("{} returned null", name)).into());
    }
    java_string(env, value)
}

/// Call a no-argument method returning a class, as a global reference
fn class_call(env: &mut JNIEnv, target: &JObject, name: &str) -> CallResult<Option<GlobalRef>> {
    let value = env.call_method(target, name, CLASS_SIG, &[])?.l()?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(env.new_global_ref(value)?))
}

fn required_class(env: &mut JNIEnv, target: &JObject, name: &str) -> CallResult<GlobalRef> {
    class_call(env, target, name)?.ok_or_else(|| RuntimeError::NotFound(format!("{} returned null", name)).into())
}

/// Elements of an object array returned by a no-argument method
fn array_call(env: &mut JNIEnv, target: &JObject, name: &str, sig: &str) -> CallResult<Vec<GlobalRef>> {
    let array = JObjectArray::from(env.call_method(target, name, sig, &[])?.l()?);
    let len = env.get_array_length(&array)?;
    let mut items = Vec::with_capacity(len as usize);
    for i in 0..len {
        let item = env.get_object_array_element(&array, i)?;
        items.push(env.new_global_ref(&item)?);
        env.delete_local_ref(item)?;
    }
    Ok(items)
}

/// JNI return type for a member of the given kind
pub(crate) fn return_type(kind: &ReturnKind) -> ReturnType {
    match kind {
        ReturnKind::Void => ReturnType::Primitive(Primitive::Void),
        ReturnKind::Int => ReturnType::Primitive(Primitive::Int),
        ReturnKind::Long => ReturnType::Primitive(Primitive::Long),
        ReturnKind::Bool => ReturnType::Primitive(Primitive::Boolean),
        ReturnKind::Double => ReturnType::Primitive(Primitive::Double),
        ReturnKind::Byte => ReturnType::Primitive(Primitive::Byte),
        ReturnKind::Short => ReturnType::Primitive(Primitive::Short),
        ReturnKind::Char => ReturnType::Primitive(Primitive::Char),
        ReturnKind::Float => ReturnType::Primitive(Primitive::Float),
        ReturnKind::Object(name) if name.starts_with('[') => ReturnType::Array,
        ReturnKind::String | ReturnKind::Object(_) => ReturnType::Object,
    }
}

/// `java.lang.String` to `java/lang/String`
pub(crate) fn internal_name(name: &str) -> String {
    name.replace('.', "/")
}

fn to_jvalue(env: &mut JNIEnv, value: &NativeValue<GlobalRef>) -> CallResult<jvalue> {
    let raw = match value {
        NativeValue::Void | NativeValue::Null => jvalue {
            l: std::ptr::null_mut(),
        },
        NativeValue::Bool(v) => JValue::Bool(u8::from(*v)).as_jni(),
        NativeValue::Byte(v) => JValue::Byte(*v).as_jni(),
        NativeValue::Short(v) => JValue::Short(*v).as_jni(),
        NativeValue::Char(v) => JValue::Char(*v).as_jni(),
        NativeValue::Int(v) => JValue::Int(*v).as_jni(),
        NativeValue::Long(v) => JValue::Long(*v).as_jni(),
        NativeValue::Float(v) => JValue::Float(*v).as_jni(),
        NativeValue::Double(v) => JValue::Double(*v).as_jni(),
        // Lives until the enclosing frame is popped
        NativeValue::Str(s) => jvalue {
            l: env.new_string(s)?.as_raw(),
        },
        NativeValue::Object(object) => jvalue {
            l: object.as_obj().as_raw(),
        },
    };
    Ok(raw)
}

fn from_jvalue(env: &mut JNIEnv, value: JValueOwned, kind: &ReturnKind) -> CallResult<NativeValue<GlobalRef>> {
    let native = match kind {
        ReturnKind::Void => NativeValue::Void,
        ReturnKind::Int => NativeValue::Int(value.i()?),
        ReturnKind::Long => NativeValue::Long(value.j()?),
        ReturnKind::Bool => NativeValue::Bool(value.z()?),
        ReturnKind::Double => NativeValue::Double(value.d()?),
        ReturnKind::Byte => NativeValue::Byte(value.b()?),
        ReturnKind::Short => NativeValue::Short(value.s()?),
        ReturnKind::Char => NativeValue::Char(value.c()?),
        ReturnKind::Float => NativeValue::Float(value.f()?),
        ReturnKind::String => {
            let object = value.l()?;
            if object.is_null() {
                NativeValue::Null
            } else {
                NativeValue::Str(java_string(env, object)?)
            }
        }
        // Strings behind a wider declared type stay references so chains continue
        ReturnKind::Object(_) => {
            let object = value.l()?;
            if object.is_null() {
                NativeValue::Null
            } else {
                NativeValue::Object(env.new_global_ref(object)?)
            }
        }
    };
    Ok(native)
}

impl ForeignRuntime for JvmRuntime {
    type Type = GlobalRef;
    type Member = GlobalRef;
    type FieldRef = GlobalRef;
    type Method = JvmMethod;
    type Field = JvmField;
    type Object = GlobalRef;

    fn type_of(&mut self, object: &GlobalRef) -> RuntimeResult<GlobalRef> {
        self.frame(|env| {
            let class = env.get_object_class(object.as_obj())?;
            Ok(env.new_global_ref(class)?)
        })
    }

    fn type_name(&mut self, ty: &GlobalRef) -> RuntimeResult<String> {
        self.frame(|env| string_call(env, ty.as_obj(), "getName"))
    }

    fn super_type(&mut self, ty: &GlobalRef) -> RuntimeResult<Option<GlobalRef>> {
        self.frame(|env| class_call(env, ty.as_obj(), "getSuperclass"))
    }

    fn find_type(&mut self, name: &str) -> RuntimeResult<GlobalRef> {
        self.frame(|env| {
            let class = env.find_class(internal_name(name))?;
            Ok(env.new_global_ref(class)?)
        })
    }

    fn declared_methods(&mut self, ty: &GlobalRef) -> RuntimeResult<Vec<GlobalRef>> {
        self.frame(|env| {
            array_call(env, ty.as_obj(), "getDeclaredMethods", "()[Ljava/lang/reflect/Method;")
        })
    }

    fn method_name(&mut self, member: &GlobalRef) -> RuntimeResult<String> {
        self.frame(|env| string_call(env, member.as_obj(), "getName"))
    }

    fn method_param_types(&mut self, member: &GlobalRef) -> RuntimeResult<Vec<GlobalRef>> {
        self.frame(|env| array_call(env, member.as_obj(), "getParameterTypes", "()[Ljava/lang/Class;"))
    }

    fn method_return_type(&mut self, member: &GlobalRef) -> RuntimeResult<GlobalRef> {
        self.frame(|env| required_class(env, member.as_obj(), "getReturnType"))
    }

    fn method_declaring_type(&mut self, member: &GlobalRef) -> RuntimeResult<GlobalRef> {
        self.frame(|env| required_class(env, member.as_obj(), "getDeclaringClass"))
    }

    fn declared_fields(&mut self, ty: &GlobalRef) -> RuntimeResult<Vec<GlobalRef>> {
        self.frame(|env| array_call(env, ty.as_obj(), "getDeclaredFields", "()[Ljava/lang/reflect/Field;"))
    }

    fn field_name(&mut self, field: &GlobalRef) -> RuntimeResult<String> {
        self.frame(|env| string_call(env, field.as_obj(), "getName"))
    }

    fn field_type(&mut self, field: &GlobalRef) -> RuntimeResult<GlobalRef> {
        self.frame(|env| required_class(env, field.as_obj(), "getType"))
    }

    fn field_declaring_type(&mut self, field: &GlobalRef) -> RuntimeResult<GlobalRef> {
        self.frame(|env| required_class(env, field.as_obj(), "getDeclaringClass"))
    }

    fn resolve_instance_method(&mut self, ty: &GlobalRef, name: &str, signature: &str) -> RuntimeResult<JvmMethod> {
        self.frame(|env| Ok(JvmMethod::Instance(env.get_method_id(as_class(ty), name, signature)?)))
    }

    fn resolve_static_method(&mut self, ty: &GlobalRef, name: &str, signature: &str) -> RuntimeResult<JvmMethod> {
        self.frame(|env| {
            Ok(JvmMethod::Static(env.get_static_method_id(as_class(ty), name, signature)?))
        })
    }

    fn resolve_instance_field(&mut self, ty: &GlobalRef, name: &str, signature: &str) -> RuntimeResult<JvmField> {
        self.frame(|env| {
            let _: JFieldID = env.get_field_id(as_class(ty), name, signature)?;
            Ok(JvmField {
                name: name.to_string(),
                token: signature.to_string(),
                is_static: false,
            })
        })
    }

    fn resolve_static_field(&mut self, ty: &GlobalRef, name: &str, signature: &str) -> RuntimeResult<JvmField> {
        self.frame(|env| {
            let _: JStaticFieldID = env.get_static_field_id(as_class(ty), name, signature)?;
            Ok(JvmField {
                name: name.to_string(),
                token: signature.to_string(),
                is_static: true,
            })
        })
    }

    fn invoke(
        &mut self,
        method: &JvmMethod,
        class: &GlobalRef,
        receiver: Option<&GlobalRef>,
        kind: &ReturnKind,
        args: &[NativeValue<GlobalRef>],
    ) -> RuntimeResult<NativeValue<GlobalRef>> {
        self.frame(|env| {
            let mut raw = Vec::with_capacity(args.len());
            for arg in args {
                raw.push(to_jvalue(env, arg)?);
            }
            let ret = return_type(kind);

            // Safety: IDs were resolved against `class` with the descriptor
            // the arguments were coerced to, and `ret` matches its return token.
            let value = match method {
                JvmMethod::Instance(id) => {
                    let receiver = receiver.ok_or_else(|| {
                        RuntimeError::Fault("java.lang.NullPointerException".to_string())
                    })?;
                    unsafe { env.call_method_unchecked(receiver.as_obj(), *id, ret, &raw)? }
                }
                JvmMethod::Static(id) => unsafe { env.call_static_method_unchecked(as_class(class), *id, ret, &raw)? },
            };
            from_jvalue(env, value, kind)
        })
    }

    fn read_field(
        &mut self,
        field: &JvmField,
        class: &GlobalRef,
        receiver: Option<&GlobalRef>,
        kind: &ReturnKind,
    ) -> RuntimeResult<NativeValue<GlobalRef>> {
        self.frame(|env| {
            let value = if field.is_static {
                env.get_static_field(as_class(class), &field.name, &field.token)?
            } else {
                let receiver = receiver.ok_or_else(|| {
                    RuntimeError::Fault("java.lang.NullPointerException".to_string())
                })?;
                env.get_field(receiver.as_obj(), &field.name, &field.token)?
            };
            from_jvalue(env, value, kind)
        })
    }

    fn stringify(&mut self, object: &GlobalRef) -> RuntimeResult<String> {
        self.frame(|env| {
            let text = env
                .call_static_method(
                    STRING_CLASS,
                    "valueOf",
                    "(Ljava/lang/Object;)Ljava/lang/String;",
                    &[JValue::Object(object.as_obj())],
                )?
                .l()?;
            java_string(env, text)
        })
    }

    fn pin(&mut self, object: &GlobalRef) -> RuntimeResult<GlobalRef> {
        self.frame(|env| Ok(env.new_global_ref(object.as_obj())?))
    }

    fn release(&mut self, object: GlobalRef) {
        // Deleted when the last clone drops
        drop(object);
    }

    fn has_pending_fault(&mut self) -> bool {
        self.vm
            .get_env()
            .and_then(|env| env.exception_check())
            .unwrap_or(false)
    }

    fn take_fault(&mut self) -> Option<String> {
        let mut env = self.vm.get_env().ok()?;
        if !env.exception_check().ok()? {
            return None;
        }
        let described = env.with_local_frame(FRAME_CAPACITY, |env| -> CallResult<String> {
            let throwable = env.exception_occurred()?;
            env.exception_clear()?;
            string_call(env, &throwable, "toString")
        });
        match described {
            Ok(text) => Some(text),
            Err(_) => {
                // toString itself threw; drop that one too
                let _ = env.exception_clear();
                Some("java.lang.Throwable".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_types() {
        assert!(matches!(return_type(&ReturnKind::Bool), ReturnType::Primitive(Primitive::Boolean)));
        assert!(matches!(return_type(&ReturnKind::Void), ReturnType::Primitive(Primitive::Void)));
        assert!(matches!(return_type(&ReturnKind::String), ReturnType::Object));
        assert!(matches!(
            return_type(&ReturnKind::Object("[Ljava.lang.String;".to_string())),
            ReturnType::Array
        ));
        assert!(matches!(
            return_type(&ReturnKind::Object("app.Player".to_string())),
            ReturnType::Object
        ));
    }

    #[test]
    fn test_internal_name() {
        assert_eq!(internal_name("java.lang.String"), "java/lang/String");
        assert_eq!(internal_name("app.Outer$Inner"), "app/Outer$Inner");
    }

    #[test]
    fn test_pending_exception_maps_to_fault() {
        let err: RuntimeError = CallError::Jni(JniError::JavaException).into();
        assert!(err.is_fault());
    }
}
