//! Minimal class file emitter for the jar fallback of the functional probe.
//!
//! Produces `public class <name> { public static void main(String[] a) {
//! System.out.print("<message>"); } }` as class-file version 50. The method
//! has no branches, so no stack map frames are needed.

const MAGIC: u32 = 0xCAFE_BABE;
const MAJOR_VERSION: u16 = 50;

const TAG_UTF8: u8 = 1;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_NAME_AND_TYPE: u8 = 12;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;
const ACC_SUPER: u16 = 0x0020;

const OP_GETSTATIC: u8 = 0xB2;
const OP_LDC: u8 = 0x12;
const OP_INVOKEVIRTUAL: u8 = 0xB6;
const OP_RETURN: u8 = 0xB1;

#[derive(Default)]
struct ConstantPool {
    bytes: Vec<u8>,
    count: u16,
}

impl ConstantPool {
    fn push(&mut self, tag: u8, payload: &[u8]) -> u16 {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(payload);
        self.count += 1;
        self.count
    }

    fn utf8(&mut self, text: &str) -> u16 {
        let mut payload = (text.len() as u16).to_be_bytes().to_vec();
        payload.extend_from_slice(text.as_bytes());
        self.push(TAG_UTF8, &payload)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.push(TAG_CLASS, &name.to_be_bytes())
    }

    fn pair(&mut self, tag: u8, first: u16, second: u16) -> u16 {
        let mut payload = first.to_be_bytes().to_vec();
        payload.extend_from_slice(&second.to_be_bytes());
        self.push(tag, &payload)
    }
}

/// Class file bytes for a program printing `message` (ASCII only).
pub fn hello_class(class_name: &str, message: &str) -> Vec<u8> {
    let mut pool = ConstantPool::default();

    let this_class = pool.class(class_name);
    let super_class = pool.class("java/lang/Object");
    let system = pool.class("java/lang/System");
    let out_name = pool.utf8("out");
    let out_type = pool.utf8("Ljava/io/PrintStream;");
    let out_nat = pool.pair(TAG_NAME_AND_TYPE, out_name, out_type);
    let out_field = pool.pair(TAG_FIELDREF, system, out_nat);
    let print_stream = pool.class("java/io/PrintStream");
    let print_name = pool.utf8("print");
    let print_type = pool.utf8("(Ljava/lang/String;)V");
    let print_nat = pool.pair(TAG_NAME_AND_TYPE, print_name, print_type);
    let print_method = pool.pair(TAG_METHODREF, print_stream, print_nat);
    let message_utf8 = pool.utf8(message);
    let message_string = pool.push(TAG_STRING, &message_utf8.to_be_bytes());
    let main_name = pool.utf8("main");
    let main_type = pool.utf8("([Ljava/lang/String;)V");
    let code_name = pool.utf8("Code");

    let mut code = vec![OP_GETSTATIC];
    code.extend_from_slice(&out_field.to_be_bytes());
    code.push(OP_LDC);
    code.push(message_string as u8);
    code.push(OP_INVOKEVIRTUAL);
    code.extend_from_slice(&print_method.to_be_bytes());
    code.push(OP_RETURN);

    let mut out = Vec::with_capacity(256 + message.len());
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&MAJOR_VERSION.to_be_bytes());
    out.extend_from_slice(&(pool.count + 1).to_be_bytes());
    out.extend_from_slice(&pool.bytes);
    out.extend_from_slice(&(ACC_PUBLIC | ACC_SUPER).to_be_bytes());
    out.extend_from_slice(&this_class.to_be_bytes());
    out.extend_from_slice(&super_class.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // interfaces
    out.extend_from_slice(&0u16.to_be_bytes()); // fields

    out.extend_from_slice(&1u16.to_be_bytes()); // methods
    out.extend_from_slice(&(ACC_PUBLIC | ACC_STATIC).to_be_bytes());
    out.extend_from_slice(&main_name.to_be_bytes());
    out.extend_from_slice(&main_type.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes()); // attributes
    out.extend_from_slice(&code_name.to_be_bytes());
    let attribute_len = 2 + 2 + 4 + code.len() as u32 + 2 + 2;
    out.extend_from_slice(&attribute_len.to_be_bytes());
    out.extend_from_slice(&2u16.to_be_bytes()); // max_stack
    out.extend_from_slice(&1u16.to_be_bytes()); // max_locals
    out.extend_from_slice(&(code.len() as u32).to_be_bytes());
    out.extend_from_slice(&code);
    out.extend_from_slice(&0u16.to_be_bytes()); // exception table
    out.extend_from_slice(&0u16.to_be_bytes()); // code attributes

    out.extend_from_slice(&0u16.to_be_bytes()); // class attributes
    out
}
